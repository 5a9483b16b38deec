//! Error types for the codec layer.
//!
//! Errors are split by where they arise:
//!
//! - [`FramingError`]: the length prefix describes a frame the endpoint will not carry.
//! - [`EofError`]: the stream ended, either cleanly at a frame boundary or part-way through a
//!   header or payload.
//! - [`CodecError`]: top-level enum wrapping both plus transport I/O errors.
//!
//! Each [`CodecError`] carries a default [`RecoveryPolicy`] via
//! [`CodecError::default_recovery_policy`].

use std::io;

use thiserror::Error;

use super::recovery::RecoveryPolicy;

/// Errors raised while mapping payloads to and from length prefixes.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Declared or actual payload size exceeds the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Size carried by the length prefix or the outgoing payload.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// Payload is too large to describe with a `u32` prefix.
    #[error("frame length {size} does not fit in a u32 prefix")]
    LengthOverflow {
        /// Size of the rejected payload.
        size: usize,
    },
}

/// EOF variants distinguishing a clean close from a truncated stream.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the connection at a frame boundary.
    #[error("connection closed cleanly at frame boundary")]
    CleanClose,

    /// The peer closed the connection while a length prefix was being read.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },

    /// The peer closed the connection while a payload was being read.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Payload size declared by the length prefix.
        expected: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use framecast::codec::{CodecError, FramingError, RecoveryPolicy};
///
/// let err = CodecError::Framing(FramingError::OversizedFrame {
///     size: 2_000_000,
///     max: 1_048_576,
/// });
///
/// assert_eq!(err.default_recovery_policy(), RecoveryPolicy::Drop);
/// assert!(!err.should_disconnect());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the recommended recovery policy for this error.
    ///
    /// | Error Type | Policy |
    /// |------------|--------|
    /// | `Framing::OversizedFrame` | `Drop` |
    /// | `Framing::LengthOverflow` | `Disconnect` |
    /// | All `Io` errors | `Disconnect` |
    /// | All `Eof` errors | `Disconnect` |
    #[must_use]
    pub fn default_recovery_policy(&self) -> RecoveryPolicy {
        match self {
            Self::Framing(FramingError::OversizedFrame { .. }) => RecoveryPolicy::Drop,
            Self::Framing(FramingError::LengthOverflow { .. }) | Self::Io(_) | Self::Eof(_) => {
                RecoveryPolicy::Disconnect
            }
        }
    }

    /// Returns true if this error represents a clean connection close.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns true if the default policy terminates the connection.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        self.default_recovery_policy() == RecoveryPolicy::Disconnect
    }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"`, `"io"` or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
