//! Error types for viewer client operations.

use std::{io, net::SocketAddr, time::Duration};

use crate::codec::CodecError;

/// Errors emitted by [`crate::client::FrameClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Establishing the TCP connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Server address that was dialled.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Transport error while reading.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The inbound byte stream could not be reassembled.
    #[error("framing error: {0}")]
    Codec(#[source] CodecError),
    /// No data arrived within the configured read timeout.
    #[error("no data received for {0:?}")]
    Timeout(Duration),
    /// The server closed the connection.
    #[error("connection closed by server")]
    Disconnected,
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Io(e),
            other => Self::Codec(other),
        }
    }
}

impl ClientError {
    /// Whether the error means the server is no longer reachable on this
    /// connection, as opposed to a local setup failure.
    #[must_use]
    pub fn is_connectivity_loss(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Codec(_) | Self::Timeout(_) | Self::Disconnected
        )
    }
}
