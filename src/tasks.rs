// ABOUTME: The per-socket I/O tasks: acceptor, inbound framer, and outbound sender
// ABOUTME: Implements readiness-polled non-blocking I/O with batched vectored writes

use crate::codec::Parser;
use crate::socket::{Event, Shared, Socket};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time;

/// Deadline on every readiness wait and accept. Doubles as the cancellation
/// latency bound: a deactivated socket's tasks exit within one period.
pub(crate) const POLL_PERIOD: Duration = Duration::from_secs(10);

/// Inbound read chunk, sized to a common TCP MTU payload.
const READ_CHUNK: usize = 1400;

/// Consecutive reads or writes performed per readiness wake before yielding
/// back to a readiness wait.
const IO_BURST: usize = 5;

/// Maximum I/O slices per vectored write.
const MAX_WRITE_SLICES: usize = 512;

/// Event channels rendezvous: an emitter suspends until the application
/// consumes the previous event, which is the inbound backpressure mechanism.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1;

/// Accept loop for listening sockets.
///
/// Each accepted peer is wrapped in a connected [`Socket`] (its framer and
/// sender already running) and handed to the application through the
/// listener's event channel. Accept failures are tolerated; the loop only
/// exits when the socket is deactivated or the application drops its handle.
pub(crate) async fn acceptor(
    shared: Arc<Shared>,
    listener: TcpListener,
    events: mpsc::Sender<Event>,
) {
    tracing::debug!(local = ?listener.local_addr().ok(), "accept loop started");
    while shared.is_active() {
        let (stream, peer) = match time::timeout(POLL_PERIOD, listener.accept()).await {
            Err(_) => continue,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "accept failed");
                continue;
            }
            Ok(Ok(pair)) => pair,
        };
        tracing::debug!(%peer, "accepted connection");
        let conn = Socket::from_stream(stream);
        if events.send(Event::NewConnection(conn)).await.is_err() {
            // Listener handle dropped mid-accept.
            shared.shutdown();
            break;
        }
    }
    tracing::debug!("accept loop stopped");
}

/// Inbound half of a connected socket.
///
/// Waits for readability, then performs up to [`IO_BURST`] non-blocking
/// reads, feeding each chunk to the parser and emitting every completed
/// frame on the event channel (suspending there while the application is
/// not consuming). EOF or a hard read error invokes the close protocol.
///
/// This task is the sole emitter of [`Event::Closed`], so a close is always
/// ordered after the last frame event; a failure in the sender task is
/// recorded on the shared state and delivered from here.
pub(crate) async fn framer(shared: Arc<Shared>, stream: Arc<TcpStream>, events: mpsc::Sender<Event>) {
    let mut parser = Parser::new();
    'readable: loop {
        loop {
            match time::timeout(POLL_PERIOD, stream.readable()).await {
                Err(_elapsed) => {
                    if !shared.is_active() {
                        finish(&shared, &events).await;
                        return;
                    }
                }
                Ok(Err(err)) => {
                    tracing::debug!(error = %err, "read readiness lost");
                    shared.fail();
                    finish(&shared, &events).await;
                    return;
                }
                Ok(Ok(())) => break,
            }
        }

        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..IO_BURST {
            let n = match stream.try_read(&mut buf) {
                Ok(0) => {
                    tracing::debug!("peer closed connection");
                    shared.fail();
                    finish(&shared, &events).await;
                    return;
                }
                Ok(n) => n,
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => continue 'readable,
                Err(err) => {
                    tracing::debug!(error = %err, "read failed");
                    shared.fail();
                    finish(&shared, &events).await;
                    return;
                }
            };

            if let Err(err) = parser.feed(&buf[..n]) {
                // Malformed input is dropped; the connection stays up.
                tracing::warn!(error = %err, "discarding unparseable inbound bytes");
            }
            while let Some(frame) = parser.next_frame() {
                if events.send(Event::Frame(frame)).await.is_err() {
                    // Application dropped the handle; nothing left to notify.
                    shared.shutdown();
                    return;
                }
            }

            if !shared.is_active() {
                finish(&shared, &events).await;
                return;
            }
        }
        // Burst exhausted; yield back to the readiness wait.
    }
}

/// Deliver the owed `Closed` event, if any. Last action of the framer on
/// every exit path except application-side teardown.
async fn finish(shared: &Shared, events: &mpsc::Sender<Event>) {
    if shared.take_close_owed() {
        let _ = events.send(Event::Closed).await;
    }
    tracing::debug!("framer task complete");
}

/// Outbound half of a connected socket.
///
/// Parks on the trigger channel while the queue is empty; once woken, waits
/// for writability and drains the queue with vectored writes, at most
/// [`IO_BURST`] per wake before re-polling. A would-block result means
/// readiness has lapsed: the partial-write cursor rewinds to the head-frame
/// start and the sender re-polls writability before retrying.
pub(crate) async fn sender(
    shared: Arc<Shared>,
    stream: Arc<TcpStream>,
    mut trigger: mpsc::Receiver<()>,
) {
    'parked: loop {
        let must_wait = {
            let mut st = shared.state();
            if !st.active {
                break 'parked;
            }
            // Empty-check and park are one atomic step, so a producer
            // appending now either sees `parked` and signals, or appended
            // before this check and the park is skipped.
            if st.queue.is_empty() {
                st.parked = true;
                true
            } else {
                false
            }
        };
        if must_wait && trigger.recv().await.is_none() {
            break 'parked;
        }

        'writable: loop {
            loop {
                match time::timeout(POLL_PERIOD, stream.writable()).await {
                    Err(_elapsed) => {
                        if !shared.is_active() {
                            break 'parked;
                        }
                    }
                    Ok(Err(err)) => {
                        tracing::debug!(error = %err, "write readiness lost");
                        shared.fail();
                        break 'parked;
                    }
                    Ok(Ok(())) => break,
                }
            }

            let mut writes = 0;
            loop {
                enum Step {
                    Park,
                    Repoll,
                    Wrote,
                    Fatal,
                }
                let step = {
                    let mut st = shared.state();
                    if !st.active {
                        break 'parked;
                    }
                    if st.queue.is_empty() {
                        Step::Park
                    } else {
                        let result = {
                            let iovs = st.queue.iovs(MAX_WRITE_SLICES);
                            stream.try_write_vectored(&iovs)
                        };
                        match result {
                            Ok(0) => Step::Fatal,
                            Ok(n) => {
                                st.queue.written(n);
                                Step::Wrote
                            }
                            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                                st.queue.rewind();
                                Step::Repoll
                            }
                            Err(err) => {
                                tracing::debug!(error = %err, "write failed");
                                Step::Fatal
                            }
                        }
                    }
                };
                match step {
                    Step::Park => continue 'parked,
                    Step::Repoll => continue 'writable,
                    Step::Fatal => {
                        shared.fail();
                        break 'parked;
                    }
                    Step::Wrote => {
                        writes += 1;
                        if writes >= IO_BURST {
                            continue 'writable;
                        }
                    }
                }
            }
        }
    }
    tracing::debug!("sender task complete");
}
