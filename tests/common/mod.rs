//! Shared utilities for integration tests.
//!
//! Provides a listener bound to an unused local port, a helper that runs a
//! frame server in the background, and a consumer that records every frame it
//! is given.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    error::Error,
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use framecast::{
    ConnectionRegistry,
    config::ServerConfig,
    consumer::FrameConsumer,
    frame::Frame,
    producer::FrameProducer,
    server::{FrameServer, ServerError},
};
use tokio::{sync::oneshot, task::JoinHandle, time::sleep};

pub type TestResult<T = ()> = Result<T, Box<dyn Error + Send + Sync>>;

/// Create a TCP listener bound to a free local port.
#[expect(
    clippy::expect_used,
    reason = "binding to an ephemeral localhost port must abort the test immediately"
)]
pub fn unused_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("failed to bind port")
}

/// A frame server running on a background task.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub registry: Arc<ConnectionRegistry>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    /// Bind `producer` to a fresh port and start serving with `config`.
    pub async fn start<P>(producer: P, config: ServerConfig) -> TestResult<Self>
    where
        P: FrameProducer + 'static,
    {
        let listener = unused_listener();
        let addr = listener.local_addr()?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = FrameServer::new(producer)
            .with_config(config)
            .ready_signal(ready_tx)
            .bind_existing_listener(listener)?;
        let registry = server.registry();
        let handle = tokio::spawn(server.run_with_shutdown(async {
            let _ = stop_rx.await;
        }));
        ready_rx.await?;
        Ok(Self {
            addr,
            registry,
            stop: Some(stop_tx),
            handle,
        })
    }

    /// Wait until exactly `count` viewers are registered.
    pub async fn wait_for_viewers(&self, count: usize) -> TestResult {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.registry.len().await != count {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(())
    }

    /// Signal shutdown and wait for the server to finish.
    pub async fn stop(mut self) -> TestResult {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await??;
        Ok(())
    }
}

/// Consumer recording every payload and whether the connection was lost.
#[derive(Debug, Default)]
pub struct Recorder {
    pub frames: Vec<Frame>,
    pub lost: bool,
}

impl FrameConsumer for Recorder {
    fn display(&mut self, frame: Frame) { self.frames.push(frame); }

    fn connection_lost(&mut self) { self.lost = true; }
}
