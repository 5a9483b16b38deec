//! Frames and the wire message format.
//!
//! A frame is one opaque, already-encoded image. On the wire every frame is
//! preceded by its length as a little-endian `u32`; a stream is nothing more
//! than these wire messages laid end to end, with no handshake, padding or
//! separators.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{byte_order::write_le_u32, codec::FramingError};

/// Size of the length prefix in bytes.
pub const LENGTH_HEADER_SIZE: usize = 4;

/// Default upper bound for a single frame payload (1 MiB).
///
/// Receivers treat a declared length above their configured bound as a
/// malformed frame; senders refuse to emit such frames.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Hard ceiling for configurable frame bounds (64 MiB).
pub const MAX_FRAME_LENGTH_LIMIT: usize = 64 * 1024 * 1024;

/// Clamp a configured frame bound into `1..=MAX_FRAME_LENGTH_LIMIT`.
pub(crate) fn clamp_frame_length(value: usize) -> usize { value.clamp(1, MAX_FRAME_LENGTH_LIMIT) }

/// One encoded image, shared cheaply between connections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Frame(Bytes);

impl Frame {
    /// Wrap encoded bytes as a frame.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self { Self(bytes.into()) }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Borrow the payload as [`Bytes`].
    #[must_use]
    pub fn bytes(&self) -> &Bytes { &self.0 }

    /// Consume the frame, returning its payload.
    #[must_use]
    pub fn into_bytes(self) -> Bytes { self.0 }
}

impl From<Bytes> for Frame {
    fn from(value: Bytes) -> Self { Self(value) }
}

impl From<Vec<u8>> for Frame {
    fn from(value: Vec<u8>) -> Self { Self(Bytes::from(value)) }
}

impl From<&'static [u8]> for Frame {
    fn from(value: &'static [u8]) -> Self { Self(Bytes::from_static(value)) }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

/// Append the wire message for `payload` to `dst`.
///
/// # Errors
///
/// Returns [`FramingError::LengthOverflow`] if the payload cannot be described
/// by a `u32` length prefix.
pub fn encode_wire_message(payload: &[u8], dst: &mut BytesMut) -> Result<(), FramingError> {
    let len = u32::try_from(payload.len()).map_err(|_| FramingError::LengthOverflow {
        size: payload.len(),
    })?;
    dst.reserve(LENGTH_HEADER_SIZE + payload.len());
    dst.put_slice(&write_le_u32(len));
    dst.put_slice(payload);
    Ok(())
}

/// Build the complete wire message for `frame` as one contiguous buffer.
///
/// The result is written to sockets in a single call so the length prefix and
/// the payload can never be separated by another write.
///
/// # Errors
///
/// Returns [`FramingError::LengthOverflow`] if the payload cannot be described
/// by a `u32` length prefix.
///
/// # Examples
///
/// ```
/// use framecast::frame::{Frame, wire_message};
///
/// let wire = wire_message(&Frame::from(vec![7_u8, 8, 9])).expect("small frame");
/// assert_eq!(wire.as_ref(), &[3, 0, 0, 0, 7, 8, 9]);
/// ```
pub fn wire_message(frame: &Frame) -> Result<Bytes, FramingError> {
    let mut dst = BytesMut::new();
    encode_wire_message(frame.as_ref(), &mut dst)?;
    Ok(dst.freeze())
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty(Vec::new(), vec![0, 0, 0, 0])]
    #[case::single(vec![0xab], vec![1, 0, 0, 0, 0xab])]
    #[case::triple(vec![1, 2, 3], vec![3, 0, 0, 0, 1, 2, 3])]
    fn wire_message_prefixes_little_endian_length(
        #[case] payload: Vec<u8>,
        #[case] expected: Vec<u8>,
    ) {
        let wire = wire_message(&Frame::from(payload)).expect("encode");
        assert_eq!(wire.as_ref(), expected.as_slice());
    }

    #[test]
    fn wire_messages_concatenate_without_separators() {
        let mut dst = BytesMut::new();
        encode_wire_message(b"ab", &mut dst).expect("encode first");
        encode_wire_message(b"c", &mut dst).expect("encode second");
        assert_eq!(dst.as_ref(), &[2, 0, 0, 0, b'a', b'b', 1, 0, 0, 0, b'c']);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(512, 512)]
    #[case(usize::MAX, MAX_FRAME_LENGTH_LIMIT)]
    fn frame_bounds_are_clamped(#[case] requested: usize, #[case] expected: usize) {
        assert_eq!(clamp_frame_length(requested), expected);
    }

    #[test]
    fn frame_exposes_payload_without_copying() {
        let bytes = Bytes::from(vec![5_u8; 16]);
        let frame = Frame::from(bytes.clone());
        assert_eq!(frame.len(), 16);
        assert_eq!(frame.bytes().as_ptr(), bytes.as_ptr());
        assert!(!frame.is_empty());
        assert!(Frame::default().is_empty());
        assert_eq!(frame.into_bytes().as_ptr(), bytes.as_ptr());
    }
}
