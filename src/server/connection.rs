//! Per-viewer tasks for [`FrameServer`](super::FrameServer).
//!
//! Viewers never send anything, so the read half of each socket is only
//! watched for end-of-stream. When the peer goes away the connection's
//! liveness flag is cleared and the next broadcast prunes it.

use std::{net::SocketAddr, sync::Arc};

use log::warn;
use tokio::{
    io::AsyncReadExt,
    net::{TcpStream, tcp::OwnedReadHalf},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

use crate::registry::{Connection, ConnectionId, ConnectionRegistry, Liveness, StreamSink};

const DISCARD_BUFFER_SIZE: usize = 512;

/// Register `stream` and spawn the task watching its peer.
pub(super) fn spawn_viewer_task(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: &Arc<ConnectionRegistry>,
    shutdown: &CancellationToken,
    tracker: &TaskTracker,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("failed to disable Nagle: error={e}, peer_addr={peer_addr}");
    }
    let registry = Arc::clone(registry);
    let shutdown = shutdown.clone();
    tracker.spawn(async move {
        let (read_half, write_half) = stream.into_split();
        let id = registry.next_id();
        let connection = Connection::new(id, Some(peer_addr), StreamSink::new(write_half));
        let liveness = connection.liveness();
        registry.register(connection).await;
        watch_peer(id, read_half, &liveness, &shutdown).await;
    });
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn watch_peer(
    id: ConnectionId,
    mut read_half: OwnedReadHalf,
    liveness: &Liveness,
    shutdown: &CancellationToken,
) {
    let mut buf = [0_u8; DISCARD_BUFFER_SIZE];
    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => return,
            () = liveness.cancelled() => return,
            res = read_half.read(&mut buf) => match res {
                Ok(0) => {
                    debug!(%id, "peer closed connection");
                    break;
                }
                Ok(n) => debug!(%id, bytes = n, "ignoring inbound bytes from viewer"),
                Err(e) => {
                    debug!(%id, error = %e, "read from viewer failed");
                    break;
                }
            },
        }
    }
    liveness.mark_closed();
}
