//! Length-prefixed framing codec.
//!
//! [`LengthPrefixedCodec`] produces a Tokio [`Decoder`]/[`Encoder`] pair for
//! the wire format: a 4-byte little-endian length followed by exactly that
//! many payload bytes. Decoding is driven by the [`Reassembler`] state
//! machine, so partial reads never lose progress.
//!
//! # Error Handling
//!
//! Errors are reported through [`CodecError`]. Oversized length prefixes are
//! handled according to the configured [`RecoveryPolicy`]:
//!
//! - [`RecoveryPolicy::Drop`]: skip the declared payload and continue.
//! - [`RecoveryPolicy::Disconnect`]: fail the stream.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{DEFAULT_MAX_FRAME_LENGTH, Frame, clamp_frame_length, encode_wire_message};

pub mod error;
pub mod reassembler;
pub mod recovery;

pub use error::{CodecError, EofError, FramingError};
pub use reassembler::{Mode, Reassembler};
pub use recovery::RecoveryPolicy;

/// Factory for framing encoders and decoders sharing one frame bound.
#[derive(Clone, Copy, Debug)]
pub struct LengthPrefixedCodec {
    max_frame_length: usize,
    recovery: RecoveryPolicy,
}

impl LengthPrefixedCodec {
    /// Construct a codec with a maximum frame length.
    ///
    /// The bound is clamped to `1..=MAX_FRAME_LENGTH_LIMIT`.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: clamp_frame_length(max_frame_length),
            recovery: RecoveryPolicy::default(),
        }
    }

    /// Replace the policy applied to oversized inbound frames.
    #[must_use]
    pub fn with_recovery_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.recovery = policy;
        self
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Return the policy applied to oversized inbound frames.
    #[must_use]
    pub fn recovery_policy(&self) -> RecoveryPolicy { self.recovery }

    /// Create a decoder with fresh reassembly state.
    #[must_use]
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder {
            reassembler: Reassembler::new(self.max_frame_length, self.recovery),
        }
    }

    /// Create an encoder enforcing the same bound.
    #[must_use]
    pub fn encoder(&self) -> FrameEncoder {
        FrameEncoder {
            max_frame_length: self.max_frame_length,
        }
    }
}

impl Default for LengthPrefixedCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH) }
}

/// Tokio decoder yielding one [`Frame`] per wire message.
#[derive(Debug)]
pub struct FrameDecoder {
    reassembler: Reassembler,
}

impl FrameDecoder {
    /// Borrow the underlying reassembly state.
    #[must_use]
    pub fn reassembler(&self) -> &Reassembler { &self.reassembler }
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (consumed, frame) = self.reassembler.advance(src)?;
        src.advance(consumed);
        Ok(frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.reassembler.eof_error() {
            EofError::CleanClose => Ok(None),
            truncated => {
                tracing::debug!(error = %truncated, "stream ended inside a wire message");
                Err(truncated.into())
            }
        }
    }
}

/// Tokio encoder writing the length prefix and payload as one buffer.
#[derive(Clone, Copy, Debug)]
pub struct FrameEncoder {
    max_frame_length: usize,
}

impl Encoder<Frame> for FrameEncoder {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_length {
            return Err(FramingError::OversizedFrame {
                size: item.len(),
                max: self.max_frame_length,
            }
            .into());
        }
        encode_wire_message(item.as_ref(), dst)?;
        Ok(())
    }
}
