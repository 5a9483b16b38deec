//! Errors raised by [`FrameServer`](super::FrameServer) operations.

use std::{io, net::SocketAddr};

use thiserror::Error;

/// Errors that may occur while setting up or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Creating, binding or configuring the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the server attempted to listen on.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
}
