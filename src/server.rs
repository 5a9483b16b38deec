//! Tokio-based frame broadcast server.
//!
//! `FrameServer` accepts viewer connections on a TCP listener, registers
//! each one with a shared [`ConnectionRegistry`], and runs a
//! [`FrameProducer`] on a fixed tick, broadcasting every frame it yields to
//! all registered viewers.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{config::ServerConfig, producer::FrameProducer, registry::ConnectionRegistry};

/// Frame broadcast server.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`FrameServer::bind`] or
/// [`FrameServer::bind_existing_listener`] before running.
///
/// # Examples
///
/// ```no_run
/// use framecast::{producer::RenderedProducer, server::FrameServer};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), framecast::server::ServerError> {
/// let server = FrameServer::new(RenderedProducer::default()).bind(([0, 0, 0, 0], 1111).into())?;
/// server.run().await
/// # }
/// ```
pub struct FrameServer<P, S = Unbound>
where
    P: FrameProducer + 'static,
    S: ServerState,
{
    pub(crate) producer: P,
    pub(crate) config: ServerConfig,
    pub(crate) registry: Arc<ConnectionRegistry>,
    /// Channel used to notify when the server is accepting connections.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so a
    /// new sender must be provided each time a server is started.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

impl<P> FrameServer<P, Unbound>
where
    P: FrameProducer + 'static,
{
    /// Create a server that broadcasts frames from `producer` using the
    /// default [`ServerConfig`].
    #[must_use]
    pub fn new(producer: P) -> Self {
        let config = ServerConfig::default();
        Self {
            producer,
            config,
            registry: Arc::new(registry_for(&config)),
            ready_tx: None,
            state: Unbound,
        }
    }

    /// Replace the server configuration.
    ///
    /// The connection registry is rebuilt so that it picks up the new frame
    /// bound and send deadline.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.registry = Arc::new(registry_for(&config));
        self.config = config;
        self
    }
}

impl<P, S> FrameServer<P, S>
where
    P: FrameProducer + 'static,
    S: ServerState,
{
    /// Register a channel notified once the server starts accepting.
    ///
    /// # Examples
    ///
    /// ```
    /// use framecast::{producer::RenderedProducer, server::FrameServer};
    /// use tokio::sync::oneshot;
    ///
    /// let (tx, _rx) = oneshot::channel();
    /// let _server = FrameServer::new(RenderedProducer::default()).ready_signal(tx);
    /// ```
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Shared handle to the registry of connected viewers.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> { Arc::clone(&self.registry) }
}

fn registry_for(config: &ServerConfig) -> ConnectionRegistry {
    ConnectionRegistry::new(config.max_frame_length_value(), config.send_timeout_value())
}

mod binding;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
