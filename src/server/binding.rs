//! Listener binding for [`FrameServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::net::{TcpListener, TcpSocket};

use super::{Bound, FrameServer, ServerState, Unbound};
use crate::{producer::FrameProducer, server::ServerError};

impl<P, S> FrameServer<P, S>
where
    P: FrameProducer + 'static,
    S: ServerState,
{
    fn into_bound(self, listener: TcpListener) -> FrameServer<P, Bound> {
        let FrameServer {
            producer,
            config,
            registry,
            ready_tx,
            ..
        } = self;
        FrameServer {
            producer,
            config,
            registry,
            ready_tx,
            state: Bound {
                listener: Arc::new(listener),
            },
        }
    }

    fn bind_to_addr(self, addr: SocketAddr) -> Result<FrameServer<P, Bound>, ServerError> {
        let bind_err = |source| ServerError::Bind { addr, source };
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket
            .listen(self.config.backlog_value())
            .map_err(bind_err)?;
        Ok(self.into_bound(listener))
    }

    fn bind_to_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<FrameServer<P, Bound>, ServerError> {
        let addr = std_listener
            .local_addr()
            .unwrap_or_else(|_| self.config.bind_addr_value());
        let bind_err = |source| ServerError::Bind { addr, source };
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let listener = TcpListener::from_std(std_listener).map_err(bind_err)?;
        Ok(self.into_bound(listener))
    }
}

impl<P> FrameServer<P, Unbound>
where
    P: FrameProducer + 'static,
{
    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to `addr` with the configured listen backlog.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use framecast::{producer::RenderedProducer, server::FrameServer};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    /// let server = FrameServer::new(RenderedProducer::default())
    ///     .bind(addr)
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if the socket cannot be created, bound or
    /// put into listening mode.
    pub fn bind(self, addr: SocketAddr) -> Result<FrameServer<P, Bound>, ServerError> {
        self.bind_to_addr(addr)
    }

    /// Bind to the address held in the server configuration.
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if binding fails.
    pub fn bind_configured(self) -> Result<FrameServer<P, Bound>, ServerError> {
        let addr = self.config.bind_addr_value();
        self.bind_to_addr(addr)
    }

    /// Adopt an already bound `StdTcpListener`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<FrameServer<P, Bound>, ServerError> {
        self.bind_to_listener(std_listener)
    }
}

impl<P> FrameServer<P, Bound>
where
    P: FrameProducer + 'static,
{
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}
