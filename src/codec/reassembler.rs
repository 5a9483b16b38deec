//! Streaming reassembly of length-prefixed frames.
//!
//! [`Reassembler`] turns an arbitrarily chunked byte stream back into the
//! frames that were written to it. Chunks may split a length prefix, split a
//! payload, straddle two messages or carry many whole messages; the
//! reassembler walks every byte left to right and always completes the field
//! it is filling before looking at the next one.
//!
//! The machine has two regular modes. In [`Mode::Header`] it collects the
//! four prefix bytes; in [`Mode::Body`] it collects exactly the declared
//! number of payload bytes and then emits them. A third mode,
//! [`Mode::Discard`], is entered when a prefix declares more than the
//! configured maximum under [`RecoveryPolicy::Drop`]: the declared bytes are
//! consumed without buffering and the machine resumes at the next prefix.

use bytes::BytesMut;
use tracing::warn;

use super::{CodecError, EofError, FramingError, RecoveryPolicy};
use crate::{
    byte_order::read_le_u32,
    frame::{DEFAULT_MAX_FRAME_LENGTH, Frame, LENGTH_HEADER_SIZE, clamp_frame_length},
};

/// Externally visible reassembly mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Accumulating the 4-byte length prefix.
    Header,
    /// Accumulating payload bytes up to the declared length.
    Body,
    /// Skipping the payload of a rejected oversized frame.
    Discard,
}

#[derive(Debug)]
enum State {
    Header { filled: usize, prefix: [u8; LENGTH_HEADER_SIZE] },
    Body { expected: usize },
    Discard { declared: usize, remaining: usize },
}

impl State {
    const fn header() -> Self {
        Self::Header {
            filled: 0,
            prefix: [0; LENGTH_HEADER_SIZE],
        }
    }
}

enum Step {
    Pending,
    HeaderComplete(u32),
    BodyComplete,
    DiscardComplete,
}

/// Per-connection reassembly state.
///
/// # Examples
///
/// ```
/// use framecast::codec::Reassembler;
///
/// let mut reassembler = Reassembler::default();
/// assert!(reassembler.push(&[3, 0, 0]).expect("partial header").is_empty());
/// let frames = reassembler
///     .push(&[0, b'a', b'b', b'c', 0, 0, 0, 0])
///     .expect("two frames");
/// assert_eq!(frames.len(), 2);
/// assert_eq!(frames[0].as_ref(), b"abc");
/// assert!(frames[1].is_empty());
/// ```
#[derive(Debug)]
pub struct Reassembler {
    state: State,
    buffer: BytesMut,
    max_frame_length: usize,
    policy: RecoveryPolicy,
    dropped: u64,
}

impl Default for Reassembler {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH, RecoveryPolicy::default()) }
}

impl Reassembler {
    /// Create a reassembler accepting payloads up to `max_frame_length` bytes.
    #[must_use]
    pub fn new(max_frame_length: usize, policy: RecoveryPolicy) -> Self {
        Self {
            state: State::header(),
            buffer: BytesMut::new(),
            max_frame_length: clamp_frame_length(max_frame_length),
            policy,
            dropped: 0,
        }
    }

    /// Largest payload this reassembler will buffer.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Policy applied to oversized length prefixes.
    #[must_use]
    pub fn recovery_policy(&self) -> RecoveryPolicy { self.policy }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self.state {
            State::Header { .. } => Mode::Header,
            State::Body { .. } => Mode::Body,
            State::Discard { .. } => Mode::Discard,
        }
    }

    /// Bytes accumulated towards the field currently being filled.
    #[must_use]
    pub fn bytes_accumulated(&self) -> usize {
        match self.state {
            State::Header { filled, .. } => filled,
            State::Body { .. } => self.buffer.len(),
            State::Discard {
                declared,
                remaining,
            } => declared - remaining,
        }
    }

    /// Payload length declared by the current prefix, if one has been read.
    #[must_use]
    pub fn expected_length(&self) -> Option<usize> {
        match self.state {
            State::Header { .. } => None,
            State::Body { expected } => Some(expected),
            State::Discard { declared, .. } => Some(declared),
        }
    }

    /// Whether the reassembler sits exactly on a frame boundary.
    #[must_use]
    pub fn is_idle(&self) -> bool { matches!(self.state, State::Header { filled: 0, .. }) }

    /// Number of oversized frames skipped so far.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 { self.dropped }

    /// Discard any partial progress and wait for a fresh length prefix.
    pub fn reset(&mut self) {
        self.state = State::header();
        self.buffer.clear();
    }

    /// Feed an entire chunk and collect every frame it completes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Framing`] when a prefix exceeds the maximum and
    /// the policy is [`RecoveryPolicy::Disconnect`]. Frames completed earlier
    /// in the same chunk are lost with the connection.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, CodecError> {
        let mut frames = Vec::new();
        let mut offset = 0;
        while let Some(rest) = chunk.get(offset..) {
            if rest.is_empty() {
                break;
            }
            let (consumed, frame) = self.advance(rest)?;
            offset += consumed;
            frames.extend(frame);
        }
        Ok(frames)
    }

    /// Consume bytes from `chunk` until one frame completes or the chunk ends.
    ///
    /// Returns the number of bytes consumed and the completed frame, if any.
    /// Bytes after a completed frame are left for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Framing`] when a prefix exceeds the maximum and
    /// the policy is [`RecoveryPolicy::Disconnect`]. The reassembler is reset
    /// and should be discarded with its connection.
    pub fn advance(&mut self, chunk: &[u8]) -> Result<(usize, Option<Frame>), CodecError> {
        let mut consumed = 0;
        while let Some(rest) = chunk.get(consumed..) {
            if rest.is_empty() {
                break;
            }
            let (taken, step) = self.fill(rest);
            consumed += taken;
            match step {
                Step::Pending => {}
                Step::HeaderComplete(declared) => {
                    if let Some(frame) = self.begin_payload(declared)? {
                        return Ok((consumed, Some(frame)));
                    }
                }
                Step::BodyComplete => {
                    self.state = State::header();
                    return Ok((consumed, Some(Frame::from(self.buffer.split().freeze()))));
                }
                Step::DiscardComplete => self.state = State::header(),
            }
        }
        Ok((consumed, None))
    }

    /// Copy as many bytes as the current field still needs.
    fn fill(&mut self, rest: &[u8]) -> (usize, Step) {
        match &mut self.state {
            State::Header { filled, prefix } => {
                let take = (LENGTH_HEADER_SIZE - *filled).min(rest.len());
                let dst = prefix.get_mut(*filled..*filled + take);
                if let (Some(dst), Some(src)) = (dst, rest.get(..take)) {
                    dst.copy_from_slice(src);
                }
                *filled += take;
                let step = if *filled == LENGTH_HEADER_SIZE {
                    Step::HeaderComplete(read_le_u32(*prefix))
                } else {
                    Step::Pending
                };
                (take, step)
            }
            State::Body { expected } => {
                let take = (*expected - self.buffer.len()).min(rest.len());
                self.buffer.extend_from_slice(rest.get(..take).unwrap_or_default());
                let step = if self.buffer.len() == *expected {
                    Step::BodyComplete
                } else {
                    Step::Pending
                };
                (take, step)
            }
            State::Discard { remaining, .. } => {
                let take = (*remaining).min(rest.len());
                *remaining -= take;
                let step = if *remaining == 0 {
                    Step::DiscardComplete
                } else {
                    Step::Pending
                };
                (take, step)
            }
        }
    }

    /// Transition out of header mode once a prefix has been decoded.
    fn begin_payload(&mut self, declared: u32) -> Result<Option<Frame>, CodecError> {
        let declared = usize::try_from(declared).unwrap_or(usize::MAX);
        if declared > self.max_frame_length {
            return self.reject(declared);
        }
        if declared == 0 {
            self.state = State::header();
            return Ok(Some(Frame::default()));
        }
        self.buffer.clear();
        self.buffer.reserve(declared);
        self.state = State::Body { expected: declared };
        Ok(None)
    }

    fn reject(&mut self, declared: usize) -> Result<Option<Frame>, CodecError> {
        let err = FramingError::OversizedFrame {
            size: declared,
            max: self.max_frame_length,
        };
        match self.policy {
            RecoveryPolicy::Drop => {
                warn!(
                    declared,
                    max = self.max_frame_length,
                    policy = self.policy.as_str(),
                    "skipping oversized frame"
                );
                self.dropped += 1;
                self.state = State::Discard {
                    declared,
                    remaining: declared,
                };
                Ok(None)
            }
            RecoveryPolicy::Disconnect => {
                self.reset();
                Err(err.into())
            }
        }
    }

    /// Describe how the stream ended given the current state.
    pub(crate) fn eof_error(&self) -> EofError {
        match self.state {
            State::Header { filled: 0, .. } => EofError::CleanClose,
            State::Header { filled, .. } => EofError::MidHeader {
                bytes_received: filled,
                header_size: LENGTH_HEADER_SIZE,
            },
            State::Body { expected } => EofError::MidFrame {
                bytes_received: self.buffer.len(),
                expected,
            },
            State::Discard {
                declared,
                remaining,
            } => EofError::MidFrame {
                bytes_received: declared - remaining,
                expected: declared,
            },
        }
    }
}
