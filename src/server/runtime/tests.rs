//! Tests for server runtime behaviour.

use std::{
    io,
    sync::{Arc, Mutex},
};

use rstest::rstest;
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::yield_now,
    time::{Duration, Instant, advance, sleep, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{AcceptLoopOptions, BackoffConfig, MockAcceptListener, accept_loop};
use crate::{
    producer::CyclingProducer,
    registry::ConnectionRegistry,
    server::test_util::{bind_server, free_listener, listener_addr, producer},
};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

async fn wait_for_connections(registry: &ConnectionRegistry, count: usize) {
    timeout(Duration::from_secs(2), async {
        while registry.len().await != count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry never reached expected size");
}

#[rstest]
#[tokio::test]
async fn test_run_with_immediate_shutdown(
    producer: CyclingProducer,
    free_listener: std::net::TcpListener,
) {
    let server = bind_server(producer, free_listener);
    let shutdown_future = async { sleep(Duration::from_millis(10)).await };
    let result = timeout(
        Duration::from_millis(1000),
        server.run_with_shutdown(shutdown_future),
    )
    .await;
    assert!(result.expect("server did not finish in time").is_ok());
}

#[rstest]
#[tokio::test]
async fn test_ready_signal_fires_before_accepting(
    producer: CyclingProducer,
    free_listener: std::net::TcpListener,
) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = bind_server(producer, free_listener).ready_signal(ready_tx);
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    timeout(Duration::from_secs(1), ready_rx)
        .await
        .expect("ready signal timed out")
        .expect("ready sender dropped");
    let _ = stop_tx.send(());
    handle
        .await
        .expect("server join error")
        .expect("server run failed");
}

#[rstest]
#[tokio::test]
async fn viewer_receives_frames_and_is_closed_on_shutdown(
    producer: CyclingProducer,
    free_listener: std::net::TcpListener,
) -> TestResult {
    let addr = listener_addr(&free_listener);
    let server = bind_server(producer, free_listener);
    let registry = server.registry();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    let mut viewer = TcpStream::connect(addr).await?;
    let mut wire = [0_u8; 7];
    timeout(Duration::from_secs(2), viewer.read_exact(&mut wire)).await??;
    assert_eq!(wire, [3, 0, 0, 0, 1, 2, 3]);
    assert_eq!(registry.len().await, 1);

    let _ = stop_tx.send(());
    handle.await??;
    assert!(registry.is_empty().await);

    let mut rest = Vec::new();
    timeout(Duration::from_secs(2), viewer.read_to_end(&mut rest)).await??;
    assert_eq!(rest.len() % 7, 0, "only whole wire messages are sent");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn departed_viewer_is_pruned(
    producer: CyclingProducer,
    free_listener: std::net::TcpListener,
) -> TestResult {
    let addr = listener_addr(&free_listener);
    let server = bind_server(producer, free_listener);
    let registry = server.registry();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    let staying = TcpStream::connect(addr).await?;
    let leaving = TcpStream::connect(addr).await?;
    wait_for_connections(&registry, 2).await;

    drop(leaving);
    wait_for_connections(&registry, 1).await;

    let _ = stop_tx.send(());
    handle.await??;
    drop(staying);
    Ok(())
}

#[tokio::test]
async fn test_accept_loop_shutdown_signal() {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let listener = Arc::new(
        TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener"),
    );

    tracker.spawn(accept_loop(
        listener,
        AcceptLoopOptions {
            registry: Arc::new(ConnectionRegistry::default()),
            shutdown: token.clone(),
            tracker: tracker.clone(),
            backoff: BackoffConfig::default(),
        },
    ));

    token.cancel();
    tracker.close();

    let result = timeout(Duration::from_millis(100), tracker.wait()).await;
    assert!(result.is_ok());
}

/// Creates a mock listener that fails every call and records when it was hit.
fn setup_backoff_mock_listener(
    calls: &Arc<Mutex<Vec<Instant>>>,
    num_calls: usize,
) -> MockAcceptListener {
    let mut listener = MockAcceptListener::new();
    let call_log = Arc::clone(calls);
    listener
        .expect_accept()
        .returning(move || {
            let call_log = Arc::clone(&call_log);
            Box::pin(async move {
                call_log.lock().expect("lock").push(Instant::now());
                Err(io::Error::other("mock error"))
            })
        })
        .times(num_calls);
    listener
        .expect_local_addr()
        .returning(|| Ok("127.0.0.1:0".parse().expect("addr parse")))
        .times(num_calls);
    listener
}

#[tokio::test(start_paused = true)]
async fn test_accept_loop_exponential_backoff_async() -> TestResult {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(setup_backoff_mock_listener(&calls, 4));
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };

    tracker.spawn(accept_loop(
        listener,
        AcceptLoopOptions {
            registry: Arc::new(ConnectionRegistry::default()),
            shutdown: token.clone(),
            tracker: tracker.clone(),
            backoff,
        },
    ));

    yield_now().await;
    assert_eq!(calls.lock().expect("lock").len(), 1);

    for ms in [5, 10, 20] {
        advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    token.cancel();
    tracker.close();
    tracker.wait().await;

    let calls = calls.lock().expect("lock");
    assert_eq!(calls.len(), 4);
    let intervals: Vec<Duration> = calls
        .windows(2)
        .map(|pair| match pair {
            [a, b] => b.duration_since(*a),
            _ => Duration::ZERO,
        })
        .collect();
    assert_eq!(
        intervals,
        vec![
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]
    );
    Ok(())
}
