//! Message-framed sockets over TCP.
//!
//! A [`Socket`] is a single handle for full-duplex exchange of discrete
//! frames (length-delimited byte payloads). A listening socket surfaces
//! accepted peers, and a connected socket surfaces inbound frames and its
//! own close, all through one event channel consumed with
//! [`Socket::recv`]. Outbound frames are queued with [`Socket::send`] and
//! drained by a background task using batched vectored writes; sending
//! never performs I/O in the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use fsock::{Event, Socket};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fsock::SocketError> {
//!     let mut listener = Socket::bind("tcp://127.0.0.1:7458").await?;
//!
//!     while let Some(event) = listener.recv().await {
//!         let Event::NewConnection(mut conn) = event else { continue };
//!         tokio::spawn(async move {
//!             while let Some(event) = conn.recv().await {
//!                 match event {
//!                     // Echo every frame back to the peer.
//!                     Event::Frame(frame) => {
//!                         if conn.send(frame).is_err() {
//!                             break;
//!                         }
//!                     }
//!                     Event::Closed => break,
//!                     Event::NewConnection(_) => unreachable!(),
//!                 }
//!             }
//!         });
//!     }
//!     Ok(())
//! }
//! ```

pub mod addr;
pub mod codec;
pub mod error;
pub mod frame;
pub mod socket;

mod tasks;

#[cfg(test)]
mod tests;

pub use codec::{CodecError, OutboundQueue, Parser, MAX_FRAME_SIZE};
pub use error::{SocketError, SocketResult};
pub use frame::Frame;
pub use socket::{Event, Socket};
