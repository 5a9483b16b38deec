//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use rstest::fixture;

use super::{Bound, FrameServer};
use crate::{config::ServerConfig, frame::Frame, producer::CyclingProducer};

/// Producer yielding the same small payload every tick.
#[fixture]
pub fn producer() -> CyclingProducer { CyclingProducer::new(vec![Frame::from(vec![1_u8, 2, 3])]) }

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents races where another process could
/// claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

/// Extract the bound address from a listener.
#[must_use]
pub fn listener_addr(listener: &StdTcpListener) -> SocketAddr {
    listener
        .local_addr()
        .expect("failed to get listener address")
}

/// Bind a server with a short tick to an existing listener.
pub fn bind_server(
    producer: CyclingProducer,
    listener: StdTcpListener,
) -> FrameServer<CyclingProducer, Bound> {
    let config = ServerConfig::default().tick_interval(std::time::Duration::from_millis(5));
    FrameServer::new(producer)
        .with_config(config)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_addr_matches_local_addr() {
        let listener = free_listener();
        let addr = listener_addr(&listener);
        assert_eq!(addr.ip(), std::net::IpAddr::from(Ipv4Addr::LOCALHOST));
        assert_eq!(
            addr,
            listener.local_addr().expect("failed to get address")
        );
    }

    #[test]
    fn unbound_server_has_no_address() {
        let server = FrameServer::new(producer());
        assert!(server.local_addr().is_none());
    }
}
