//! Command line interface for the `framecast` binary.
//!
//! Shared with `build.rs`, which renders the man page from these
//! definitions, so this file depends only on `clap` and `std`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `framecast` binary.
#[derive(Debug, Parser)]
#[command(
    name = "framecast",
    version,
    about = "Broadcast rendered frames to TCP viewers"
)]
pub struct Cli {
    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands understood by `framecast`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the frame server.
    Serve(ServeArgs),
    /// Connect to a frame server and report received frames.
    View(ViewArgs),
}

/// Options for `framecast serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
    /// Port to listen on.
    #[arg(short, long, default_value_t = 1111)]
    pub port: u16,
    /// Milliseconds between frames.
    #[arg(long, default_value_t = 60)]
    pub interval_ms: u64,
    /// Largest frame, in bytes, the server will send.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub max_frame_length: usize,
    /// Pending connection queue length.
    #[arg(long, default_value_t = 10)]
    pub backlog: u32,
    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// Options for `framecast view`.
#[derive(Debug, Args)]
pub struct ViewArgs {
    /// Server host.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,
    /// Server port.
    #[arg(short, long, default_value_t = 1111)]
    pub port: u16,
    /// Give up after this many milliseconds without data.
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,
    /// Largest frame, in bytes, the viewer will accept.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub max_frame_length: usize,
    /// Close the connection on an oversized frame instead of skipping it.
    #[arg(long)]
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn serve_defaults_match_reference_deployment() {
        let cli = Cli::parse_from(["framecast", "serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve subcommand");
        };
        assert_eq!(args.port, 1111);
        assert!(args.bind.is_unspecified());
        assert_eq!(args.interval_ms, 60);
        assert_eq!(args.max_frame_length, 1024 * 1024);
        assert!(args.metrics_addr.is_none());
    }

    #[test]
    fn parses_view_options() {
        let cli = Cli::parse_from([
            "framecast",
            "view",
            "--host",
            "10.0.0.2",
            "--port",
            "2222",
            "--read-timeout-ms",
            "500",
            "--strict",
        ]);
        let Command::View(args) = cli.command else {
            panic!("expected view subcommand");
        };
        assert_eq!(args.host, IpAddr::from([10, 0, 0, 2]));
        assert_eq!(args.port, 2222);
        assert_eq!(args.read_timeout_ms, Some(500));
        assert!(args.strict);
    }
}
