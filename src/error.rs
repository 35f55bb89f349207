// ABOUTME: Socket error types for comprehensive error handling across all socket operations
// ABOUTME: Provides structured error reporting with automatic conversion from underlying I/O and codec errors

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

/// Comprehensive error type for socket operations
///
/// Constructor and send errors are surfaced synchronously through this type.
/// Failures inside the I/O tasks are not; those terminate the connection and
/// reach the application as a [`Closed`](crate::Event::Closed) event.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Address did not match `tcp://<host>:<port>` (port > 0) or `unix://<path>`
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// I/O error during bind, connect, or accept
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport recognized by the address grammar but not implemented
    #[error("unsupported transport: {0}")]
    Unsupported(&'static str),

    /// Frame construction or parse error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Send called on a listening socket
    #[error("socket is not connected")]
    NotConnected,

    /// Send called on a dead socket
    #[error("socket is closed")]
    Closed,
}

/// Result type alias for socket operations
pub type SocketResult<T> = Result<T, SocketError>;
