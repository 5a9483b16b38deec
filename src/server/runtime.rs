//! Runtime control for [`FrameServer`].

mod accept;
mod backoff;
#[cfg(test)]
mod tests;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::{info, warn};
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, FrameServer, ServerError};
use crate::producer::{FrameProducer, production_loop};

impl<P> FrameServer<P, Bound>
where
    P: FrameProducer + 'static,
{
    /// Run the server until Ctrl+C is received.
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use framecast::{producer::RenderedProducer, server::FrameServer};
    ///
    /// async fn try_run() {
    ///     FrameServer::new(RenderedProducer::default())
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept and send failures are handled internally, so this currently
    /// always returns `Ok(())`.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// On shutdown the accept loop and the production loop stop, every
    /// registered viewer is closed, and all spawned tasks are awaited.
    ///
    /// # Examples
    ///
    /// ```
    /// use framecast::{producer::RenderedProducer, server::FrameServer};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), framecast::server::ServerError> {
    /// let server = FrameServer::new(RenderedProducer::default()).bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`FrameServer::run`].
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let FrameServer {
            producer,
            config,
            registry,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        if let Ok(addr) = listener.local_addr() {
            info!("listening for viewers: local_addr={addr}");
        }

        tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                registry: Arc::clone(&registry),
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
                backoff: config.backoff_value(),
            },
        ));
        tracker.spawn(production_loop(
            producer,
            Arc::clone(&registry),
            config.tick_interval_value(),
            shutdown_token.clone(),
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        let closed = registry.close_all().await;
        info!("server stopped: closed_connections={closed}");
        Ok(())
    }
}
