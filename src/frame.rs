//! Provides the frame type exchanged over a socket: an opaque byte payload
//! carried on the wire behind a length prefix.

use crate::codec::{CodecError, MAX_FRAME_SIZE};
use bytes::{BufMut, Bytes, BytesMut};
use core::fmt;

/// Size of the wire header preceding every payload: a `u32` big-endian
/// payload length.
pub const HEADER_SIZE: usize = 4;

/// A single application message.
///
/// The payload is reference-counted (`Bytes`), so cloning a frame or moving
/// it between the parser, the outbound queue, and the application never
/// copies the bytes. The payload may be empty; the wire representation is
/// then just the header.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Wrap an existing payload in a frame.
    ///
    /// Fails with [`CodecError::Oversized`] if the payload exceeds
    /// [`MAX_FRAME_SIZE`].
    pub fn new(payload: Bytes) -> Result<Frame, CodecError> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(CodecError::Oversized {
                length: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(Frame { payload })
    }

    /// Build a frame by copying `data` into an owned payload.
    pub fn from_slice(data: &[u8]) -> Result<Frame, CodecError> {
        Frame::new(Bytes::copy_from_slice(data))
    }

    /// Wrap a payload whose length the parser has already validated.
    pub(crate) fn from_parsed(payload: Bytes) -> Frame {
        Frame { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame, returning the payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of bytes this frame occupies on the wire, header included.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// The encoded header for this frame.
    pub(crate) fn header(&self) -> [u8; HEADER_SIZE] {
        (self.payload.len() as u32).to_be_bytes()
    }

    /// Encode header and payload into one contiguous buffer.
    ///
    /// The I/O path renders frames as separate header/payload slices for
    /// vectored writes instead; this is for tests and tooling.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_slice(&self.header());
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Frame").field("len", &self.len()).finish()
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = CodecError;

    fn try_from(data: &[u8]) -> Result<Frame, CodecError> {
        Frame::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian_length() {
        let frame = Frame::from_slice(b"hello").unwrap();
        assert_eq!(frame.header(), [0x00, 0x00, 0x00, 0x05]);
        assert_eq!(frame.wire_len(), 9);
    }

    #[test]
    fn to_bytes_prefixes_payload() {
        let frame = Frame::from_slice(b"hi").unwrap();
        assert_eq!(frame.to_bytes().as_ref(), b"\x00\x00\x00\x02hi");
    }

    #[test]
    fn empty_frame_is_header_only() {
        let frame = Frame::from_slice(b"").unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.wire_len(), HEADER_SIZE);
        assert_eq!(frame.to_bytes().as_ref(), b"\x00\x00\x00\x00");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = Bytes::from(vec![0u8; MAX_FRAME_SIZE + 1]);
        let result = Frame::new(payload);
        assert!(matches!(result, Err(CodecError::Oversized { .. })));
    }
}
