//! `framecast` binary: run a frame server or a logging viewer.

mod cli;

use std::{error::Error, net::SocketAddr, process::ExitCode, time::Duration};

use clap::Parser;
use cli::{Cli, Command, ServeArgs, ViewArgs};
use framecast::{
    client::FrameClient,
    codec::RecoveryPolicy,
    config::{ClientConfig, ServerConfig},
    consumer::{DecodingConsumer, LatestFrame, LoggingDisplay, display_loop},
    producer::RenderedProducer,
    server::FrameServer,
};
use log::info;
use tokio::signal;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::View(args) => view(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "framecast failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), BoxError> {
    install_metrics(args.metrics_addr)?;
    let config = ServerConfig::default()
        .bind_addr(SocketAddr::new(args.bind, args.port))
        .backlog(args.backlog)
        .tick_interval(Duration::from_millis(args.interval_ms))
        .max_frame_length(args.max_frame_length);
    FrameServer::new(RenderedProducer::default())
        .with_config(config)
        .bind_configured()?
        .run()
        .await?;
    Ok(())
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn view(args: ViewArgs) -> Result<(), BoxError> {
    let policy = if args.strict {
        RecoveryPolicy::Disconnect
    } else {
        RecoveryPolicy::Drop
    };
    let config = ClientConfig::default()
        .server_addr(SocketAddr::new(args.host, args.port))
        .max_frame_length(args.max_frame_length)
        .recovery_policy(policy)
        .read_timeout(args.read_timeout_ms.map(Duration::from_millis));

    let client = FrameClient::connect(&config).await?;
    let (mut latest, watch) = LatestFrame::new();
    let display = tokio::spawn(display_loop(
        watch,
        DecodingConsumer::new(LoggingDisplay::default()),
    ));

    let end = tokio::select! {
        end = client.run(&mut latest) => Some(end),
        _ = signal::ctrl_c() => None,
    };
    drop(latest);
    let consumer = display.await?;
    info!(
        "viewer stopped: frames_shown={}, frames_dropped={}",
        consumer.display_ref().shown(),
        consumer.dropped()
    );

    match end.and_then(|end| end.error) {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: Option<SocketAddr>) -> Result<(), BoxError> {
    if let Some(addr) = addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("serving metrics: addr={addr}");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: Option<SocketAddr>) -> Result<(), BoxError> {
    if addr.is_some() {
        log::warn!("--metrics-addr ignored: built without the metrics feature");
    }
    Ok(())
}
