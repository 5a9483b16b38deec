//! Accept-loop utilities for the server runtime.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{metrics, registry::ConnectionRegistry, server::connection::spawn_viewer_task};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub registry: Arc<ConnectionRegistry>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept viewers until `shutdown` fires.
///
/// Every accepted stream is registered with the registry and handed to a
/// tracked task that watches its peer. Failed accepts are logged and retried
/// after an exponential back-off; they never end the loop.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, options: AcceptLoopOptions)
where
    L: AcceptListener + Send + Sync + 'static,
{
    let backoff = options.backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let options = AcceptLoopOptions { backoff, ..options };
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(listener.as_ref(), &options, delay).await {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<L>(
    listener: &L,
    options: &AcceptLoopOptions,
    delay: Duration,
) -> Option<Duration>
where
    L: AcceptListener + Send + Sync + 'static,
{
    select! {
        biased;

        () = options.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer_addr)) => {
                spawn_viewer_task(
                    stream,
                    peer_addr,
                    &options.registry,
                    &options.shutdown,
                    &options.tracker,
                );
                options.backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                metrics::inc_errors("accept");
                select! {
                    biased;

                    () = options.shutdown.cancelled() => return None,
                    () = sleep(delay) => {}
                }
                options.backoff.next_delay(delay)
            }
        }),
    }
}
