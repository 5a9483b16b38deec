//! Tests for the viewer client runtime.

use std::{net::SocketAddr, time::Duration};

use rstest::rstest;
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

use super::*;
use crate::{
    codec::{CodecError, EofError, RecoveryPolicy},
    config::ClientConfig,
    consumer::{FrameConsumer, LatestFrame},
    frame::Frame,
};

fn client_over_duplex(config: &ClientConfig) -> (FrameClient<DuplexStream>, DuplexStream) {
    let (local, remote) = duplex(256);
    (FrameClient::from_stream(local, config), remote)
}

#[derive(Default)]
struct Collect {
    frames: Vec<Vec<u8>>,
    lost: usize,
}

impl FrameConsumer for Collect {
    fn display(&mut self, frame: Frame) { self.frames.push(frame.as_ref().to_vec()); }

    fn connection_lost(&mut self) { self.lost += 1; }
}

#[tokio::test]
async fn frames_split_across_writes_are_reassembled() {
    let (mut client, mut server) = client_over_duplex(&ClientConfig::default());
    tokio::spawn(async move {
        for chunk in [&[2_u8, 0][..], &[0, 0, 0xaa], &[0xbb, 1, 0, 0, 0, 0xcc]] {
            server.write_all(chunk).await.expect("write");
        }
    });

    assert_eq!(client.receive().await.expect("first").as_ref(), &[0xaa, 0xbb]);
    assert_eq!(client.receive().await.expect("second").as_ref(), &[0xcc]);
    assert!(matches!(
        client.receive().await,
        Err(ClientError::Disconnected)
    ));
    assert_eq!(client.frames_received(), 2);
}

#[tokio::test]
async fn run_reports_clean_close_to_consumer() {
    let (client, mut server) = client_over_duplex(&ClientConfig::default());
    server
        .write_all(&[1, 0, 0, 0, 7, 0, 0, 0, 0])
        .await
        .expect("write");
    drop(server);

    let mut consumer = Collect::default();
    let end = client.run(&mut consumer).await;

    assert!(end.is_clean());
    assert_eq!(end.frames_received, 2);
    assert_eq!(consumer.frames, vec![vec![7], Vec::new()]);
    assert_eq!(consumer.lost, 1);
}

#[tokio::test]
async fn truncated_stream_ends_session_with_codec_error() {
    let (client, mut server) = client_over_duplex(&ClientConfig::default());
    server.write_all(&[5, 0, 0, 0, 1, 2]).await.expect("write");
    drop(server);

    let mut consumer = Collect::default();
    let end = client.run(&mut consumer).await;

    assert!(matches!(
        end.error,
        Some(ClientError::Codec(CodecError::Eof(EofError::MidFrame {
            bytes_received: 2,
            expected: 5
        })))
    ));
    assert!(consumer.frames.is_empty());
    assert_eq!(consumer.lost, 1);
}

#[rstest]
#[case::drop(RecoveryPolicy::Drop, true)]
#[case::disconnect(RecoveryPolicy::Disconnect, false)]
#[tokio::test]
async fn oversized_frames_follow_recovery_policy(
    #[case] policy: RecoveryPolicy,
    #[case] resyncs: bool,
) {
    let config = ClientConfig::default()
        .max_frame_length(4)
        .recovery_policy(policy);
    let (client, mut server) = client_over_duplex(&config);
    server
        .write_all(&[6, 0, 0, 0, 1, 2, 3, 4, 5, 6, 1, 0, 0, 0, 9])
        .await
        .expect("write");
    drop(server);

    let mut consumer = Collect::default();
    let end = client.run(&mut consumer).await;

    if resyncs {
        assert!(end.is_clean());
        assert_eq!(consumer.frames, vec![vec![9]]);
    } else {
        assert!(end.error.is_some());
        assert!(consumer.frames.is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn silent_server_trips_read_timeout() {
    let config = ClientConfig::default().read_timeout(Some(Duration::from_millis(200)));
    let (mut client, _server) = client_over_duplex(&config);
    let err = client.next_frame().await.expect_err("timeout expected");
    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(200)));
    assert!(err.is_connectivity_loss());
}

#[tokio::test(start_paused = true)]
async fn slow_but_steady_frame_does_not_trip_read_timeout() {
    let config = ClientConfig::default().read_timeout(Some(Duration::from_millis(100)));
    let (mut client, mut server) = client_over_duplex(&config);
    tokio::spawn(async move {
        server.write_all(&[10, 0, 0, 0]).await.expect("write header");
        for byte in 0..10_u8 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            server.write_all(&[byte]).await.expect("write payload byte");
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let started = tokio::time::Instant::now();
    let frame = client.next_frame().await.expect("frame").expect("open");
    assert_eq!(frame.as_ref(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert!(started.elapsed() >= Duration::from_millis(300));

    let err = client.next_frame().await.expect_err("server went quiet");
    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(100)));
}

#[tokio::test(start_paused = true)]
async fn stall_inside_a_frame_trips_read_timeout() {
    let config = ClientConfig::default().read_timeout(Some(Duration::from_millis(100)));
    let (mut client, mut server) = client_over_duplex(&config);
    server.write_all(&[4, 0, 0, 0, 1, 2]).await.expect("write");

    let err = client.next_frame().await.expect_err("timeout expected");
    assert!(matches!(err, ClientError::Timeout(_)));
    assert_eq!(client.reassembler().bytes_accumulated(), 2);
    drop(server);
}

#[tokio::test]
async fn latest_frame_consumer_ends_disconnected() {
    let (client, mut server) = client_over_duplex(&ClientConfig::default());
    server
        .write_all(&[1, 0, 0, 0, 1, 1, 0, 0, 0, 2])
        .await
        .expect("write");
    drop(server);

    let (mut latest, watch) = LatestFrame::new();
    let end = client.run(&mut latest).await;
    assert_eq!(end.frames_received, 2);
    assert_eq!(latest.received(), 2);
    assert_eq!(watch.latest_frame(), None);
    assert_eq!(watch.state(), crate::consumer::ViewState::Disconnected);
}

#[tokio::test]
async fn connect_failure_is_reported_not_retried() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr: SocketAddr = listener.local_addr().expect("addr");
    drop(listener);

    let config = ClientConfig::default().server_addr(addr);
    let err = FrameClient::connect(&config)
        .await
        .expect_err("nothing is listening");
    assert!(matches!(err, ClientError::Connect { addr: a, .. } if a == addr));
    assert!(!err.is_connectivity_loss());
}
