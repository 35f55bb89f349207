// Frame codec - separates wire-format concerns from the socket I/O engine
//
// Two halves, matching the two directions of a connection: `Parser` turns an
// arbitrary sequence of byte chunks into complete inbound frames, and
// `OutboundQueue` turns a FIFO of queued frames into the I/O slices for the
// next vectored write, tracking partial-write progress across calls.

use crate::frame::{Frame, HEADER_SIZE};
use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;
use std::io::IoSlice;
use thiserror::Error;

/// Maximum allowed payload size, to prevent memory exhaustion from a hostile
/// or corrupted length prefix.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB

/// Codec errors with context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame length {length} exceeds maximum of {max} bytes")]
    Oversized { length: usize, max: usize },
}

/// Incremental inbound frame parser.
///
/// Bytes are fed in whatever chunks the socket produces; complete frames
/// accumulate in an internal FIFO and are handed out by [`next_frame`] in
/// wire order. Frame payloads are zero-copy slices of the accumulation
/// buffer, so a payload stays alive for as long as the application holds the
/// frame, independent of the parser.
///
/// [`next_frame`]: Parser::next_frame
#[derive(Debug, Default)]
pub struct Parser {
    buf: BytesMut,
    frames: VecDeque<Frame>,
}

impl Parser {
    pub fn new() -> Parser {
        Parser::default()
    }

    /// Feed a chunk of inbound bytes, extracting every frame that is now
    /// complete.
    ///
    /// On an oversized length prefix the buffered bytes are discarded and an
    /// error is returned; the stream has no frame boundary to resynchronize
    /// on, so the caller chooses whether to keep the connection. Frames
    /// completed by earlier chunks remain available.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), CodecError> {
        self.buf.extend_from_slice(chunk);
        loop {
            if self.buf.len() < HEADER_SIZE {
                return Ok(());
            }
            let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
                as usize;
            if length > MAX_FRAME_SIZE {
                self.buf.clear();
                return Err(CodecError::Oversized {
                    length,
                    max: MAX_FRAME_SIZE,
                });
            }
            if self.buf.len() < HEADER_SIZE + length {
                return Ok(());
            }
            self.buf.advance(HEADER_SIZE);
            let payload = self.buf.split_to(length).freeze();
            self.frames.push_back(Frame::from_parsed(payload));
        }
    }

    /// Pop the oldest completed frame, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Number of completed frames waiting to be taken.
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    /// Bytes buffered toward a not-yet-complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// One frame staged for transmission. The header is stored alongside the
/// payload so both can be referenced as I/O slices without re-encoding.
#[derive(Debug)]
struct Staged {
    header: [u8; HEADER_SIZE],
    payload: Bytes,
}

impl Staged {
    fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// FIFO of frames awaiting transmission.
///
/// [`iovs`] renders the queue head into at most `max` I/O slices for a
/// single vectored write, resuming `out_index` bytes into the head frame if
/// an earlier write stopped partway through it. [`written`] consumes
/// transmitted bytes, releasing whole frames and advancing the cursor.
/// Frames always render in insertion order.
///
/// The queue is unbounded; backpressure comes from the socket's send buffer
/// filling and the sender task parking, not from the queue itself.
///
/// [`iovs`]: OutboundQueue::iovs
/// [`written`]: OutboundQueue::written
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<Staged>,
    out_index: usize,
}

impl OutboundQueue {
    pub fn new() -> OutboundQueue {
        OutboundQueue::default()
    }

    /// Append a frame at the tail.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(Staged {
            header: frame.header(),
            payload: frame.into_payload(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames not yet fully transmitted.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Bytes of the head frame already written by previous calls.
    pub fn out_index(&self) -> usize {
        self.out_index
    }

    /// Render up to `max` I/O slices describing exactly the bytes to write
    /// next, in queue order, starting `out_index` bytes into the head frame.
    pub fn iovs(&self, max: usize) -> Vec<IoSlice<'_>> {
        let mut slices = Vec::with_capacity(max.min(self.frames.len() * 2));
        let mut skip = self.out_index;
        for staged in &self.frames {
            if slices.len() >= max {
                break;
            }
            if skip >= HEADER_SIZE {
                skip -= HEADER_SIZE;
            } else {
                slices.push(IoSlice::new(&staged.header[skip..]));
                skip = 0;
            }
            if slices.len() >= max {
                break;
            }
            if !staged.payload.is_empty() {
                slices.push(IoSlice::new(&staged.payload[skip..]));
            }
            skip = 0;
        }
        slices
    }

    /// Reset the partial-write cursor to the start of the head frame.
    ///
    /// Called when write readiness lapses before a retry; the next render
    /// restarts the head frame from its first byte.
    pub fn rewind(&mut self) {
        self.out_index = 0;
    }

    /// Record that `n` bytes from the front of the rendered sequence were
    /// written. Fully transmitted frames are released; a partially
    /// transmitted head frame keeps its progress in `out_index` so the next
    /// render resumes at the exact byte offset.
    pub fn written(&mut self, mut n: usize) {
        while n > 0 {
            let Some(head) = self.frames.front() else {
                debug_assert!(false, "written({n}) past the end of the queue");
                return;
            };
            let remaining = head.wire_len() - self.out_index;
            if n >= remaining {
                self.frames.pop_front();
                self.out_index = 0;
                n -= remaining;
            } else {
                self.out_index += n;
                n = 0;
            }
        }
    }
}
