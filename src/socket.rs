// ABOUTME: Provides the Socket handle multiplexing listening, framing, and batched sends
// ABOUTME: Implements the event-channel contract surfacing connections, frames, and closes

use crate::addr::Endpoint;
use crate::codec::OutboundQueue;
use crate::error::SocketError;
use crate::frame::Frame;
use crate::tasks;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Values delivered on a socket's event channel.
///
/// A listening socket emits only [`NewConnection`]; a connected socket emits
/// [`Frame`] events in wire order followed by at most one [`Closed`], which
/// is always the last event on the channel.
///
/// [`NewConnection`]: Event::NewConnection
/// [`Frame`]: Event::Frame
/// [`Closed`]: Event::Closed
#[derive(Debug)]
pub enum Event {
    /// A listener accepted a peer; the receiver takes ownership.
    NewConnection(Socket),
    /// An inbound frame.
    Frame(Frame),
    /// This connection died (peer close or unrecoverable I/O error).
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Listener,
    Connected,
}

/// Mutable per-socket state. One mutex covers the whole record: producers,
/// the sender task, and lifecycle transitions all serialize here, and the
/// lock is never held across an await point.
#[derive(Debug)]
pub(crate) struct State {
    /// Lifecycle flag. Cleared exactly once, never set again.
    pub(crate) active: bool,
    /// A fatal I/O error cleared `active`; a `Closed` event is still owed.
    pub(crate) close_owed: bool,
    /// The sender task is suspended on the trigger channel.
    pub(crate) parked: bool,
    pub(crate) queue: OutboundQueue,
}

/// State shared between the application handle and the I/O tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<State>,
    trigger: mpsc::Sender<()>,
}

impl Shared {
    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves only per-connection state
        // behind it; keep the connection usable rather than poisoning it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state().active
    }

    /// Record a fatal I/O outcome: deactivate once and note that the
    /// application is owed a `Closed` event. Idempotent; a socket already
    /// torn down stays torn down with nothing owed.
    pub(crate) fn fail(&self) {
        let wake = {
            let mut st = self.state();
            if !st.active {
                return;
            }
            st.active = false;
            st.close_owed = true;
            std::mem::take(&mut st.parked)
        };
        if wake {
            let _ = self.trigger.try_send(());
        }
    }

    /// Cooperative teardown: deactivate without owing a `Closed` event.
    pub(crate) fn shutdown(&self) {
        let wake = {
            let mut st = self.state();
            if !st.active {
                return;
            }
            st.active = false;
            std::mem::take(&mut st.parked)
        };
        if wake {
            let _ = self.trigger.try_send(());
        }
    }

    /// Consume the owed-close marker, if set. Called only by the framer
    /// task, which is the sole emitter of `Closed` events.
    pub(crate) fn take_close_owed(&self) -> bool {
        std::mem::take(&mut self.state().close_owed)
    }
}

/// A message-framed socket endpoint.
///
/// Created by [`bind`](Socket::bind) (listening) or
/// [`connect`](Socket::connect) (connected); accepted peers arrive as
/// connected sockets inside [`Event::NewConnection`]. All inbound activity
/// is consumed from [`recv`](Socket::recv); outbound frames are queued with
/// [`send`](Socket::send) / [`send_bytes`](Socket::send_bytes), which never
/// perform I/O themselves.
///
/// Dropping the handle (or calling [`close`](Socket::close)) deactivates the
/// socket; its tasks observe that within one readiness-poll period and exit.
#[derive(Debug)]
pub struct Socket {
    shared: Arc<Shared>,
    events: mpsc::Receiver<Event>,
    kind: Kind,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl Socket {
    /// Open a listening socket and start accepting.
    ///
    /// Accepted connections are delivered as [`Event::NewConnection`] on
    /// this socket's event channel.
    pub async fn bind(addr: &str) -> Result<Socket, SocketError> {
        let (host, port) = match Endpoint::parse(addr)? {
            Endpoint::Tcp { host, port } => (host, port),
            Endpoint::Unix { .. } => return Err(SocketError::Unsupported("unix")),
        };
        let listener = TcpListener::bind((host.as_str(), port)).await?;
        let local_addr = listener.local_addr().ok();

        let (events_tx, events_rx) = mpsc::channel(tasks::EVENT_CHANNEL_CAPACITY);
        let (trigger_tx, _trigger_rx) = mpsc::channel(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                active: true,
                close_owed: false,
                parked: false,
                queue: OutboundQueue::new(),
            }),
            trigger: trigger_tx,
        });

        tokio::spawn(tasks::acceptor(shared.clone(), listener, events_tx));

        Ok(Socket {
            shared,
            events: events_rx,
            kind: Kind::Listener,
            local_addr,
            peer_addr: None,
        })
    }

    /// Establish an outbound connection.
    pub async fn connect(addr: &str) -> Result<Socket, SocketError> {
        let (host, port) = match Endpoint::parse(addr)? {
            Endpoint::Tcp { host, port } => (host, port),
            Endpoint::Unix { .. } => return Err(SocketError::Unsupported("unix")),
        };
        let stream = TcpStream::connect((host.as_str(), port)).await?;
        Ok(Socket::from_stream(stream))
    }

    /// Wrap an established stream in a connected socket, spawning its
    /// framer and sender tasks. Used by `connect` and by the acceptor.
    pub(crate) fn from_stream(stream: TcpStream) -> Socket {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        let stream = Arc::new(stream);

        let (events_tx, events_rx) = mpsc::channel(tasks::EVENT_CHANNEL_CAPACITY);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                active: true,
                close_owed: false,
                parked: false,
                queue: OutboundQueue::new(),
            }),
            trigger: trigger_tx,
        });

        tokio::spawn(tasks::framer(shared.clone(), stream.clone(), events_tx));
        tokio::spawn(tasks::sender(shared.clone(), stream, trigger_rx));

        Socket {
            shared,
            events: events_rx,
            kind: Kind::Connected,
            local_addr,
            peer_addr,
        }
    }

    /// Queue a frame for transmission, waking the sender task if it is
    /// parked. Never blocks on I/O.
    ///
    /// Frames queued from one caller reach the wire in queue order.
    pub fn send(&self, frame: Frame) -> Result<(), SocketError> {
        if self.kind != Kind::Connected {
            return Err(SocketError::NotConnected);
        }
        let wake = {
            let mut st = self.shared.state();
            if !st.active {
                return Err(SocketError::Closed);
            }
            st.queue.push(frame);
            // One-slot wake-up: signal only a parked sender, and clear the
            // flag before signalling so at most one trigger is outstanding.
            std::mem::take(&mut st.parked)
        };
        if wake {
            let _ = self.shared.trigger.try_send(());
        }
        Ok(())
    }

    /// Build a frame from raw bytes and queue it. Equivalent to
    /// `send(Frame::from_slice(bytes)?)`.
    pub fn send_bytes(&self, bytes: &[u8]) -> Result<(), SocketError> {
        self.send(Frame::from_slice(bytes)?)
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the socket's tasks have exited and every pending
    /// event has been consumed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// True iff the socket is no longer active: the peer closed, an
    /// unrecoverable I/O error occurred, or [`close`](Socket::close) ran.
    pub fn is_dead(&self) -> bool {
        !self.shared.is_active()
    }

    /// Cooperative teardown. Both I/O tasks observe the dead state within
    /// one readiness-poll period and exit; no `Closed` event is emitted.
    pub fn close(&self) {
        self.shared.shutdown();
    }

    /// The local address of the underlying OS socket, if known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The peer address, for connected sockets.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
