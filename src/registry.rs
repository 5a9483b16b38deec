//! Registry of live viewer connections and the broadcaster that feeds them.
//!
//! [`ConnectionRegistry`] owns every live [`Connection`] behind a single
//! asynchronous mutex. The accept path adds connections and the broadcast
//! path removes them, both under that lock, so the live set is never
//! observed half-updated.
//!
//! A broadcast encodes the frame once, then writes the same wire message to
//! every connection concurrently. Each connection is borrowed mutably by
//! exactly one send future, which keeps writes to a single socket serialised
//! while different sockets progress independently. Connections whose send
//! fails, times out or whose peer has already gone are collected during the
//! pass and closed once every send has settled.

use std::{
    collections::BTreeMap,
    fmt,
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use log::info;
use thiserror::Error;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    codec::FramingError,
    config::DEFAULT_SEND_TIMEOUT,
    frame::{DEFAULT_MAX_FRAME_LENGTH, Frame, clamp_frame_length, wire_message},
    metrics,
};

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Outbound half of a viewer connection.
///
/// Implementations receive complete wire messages and must write each one
/// in full before returning.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one complete wire message.
    async fn send_wire(&mut self, wire: &Bytes) -> io::Result<()>;

    /// Shut the sink down. Called at most once per connection.
    async fn close(&mut self) -> io::Result<()>;
}

/// [`FrameSink`] over any Tokio writer, such as a TCP write half.
#[derive(Debug)]
pub struct StreamSink<W>(W);

impl<W> StreamSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self { Self(writer) }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W { self.0 }
}

#[async_trait]
impl<W> FrameSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_wire(&mut self, wire: &Bytes) -> io::Result<()> {
        self.0.write_all(wire).await?;
        self.0.flush().await
    }

    async fn close(&mut self) -> io::Result<()> { self.0.shutdown().await }
}

/// Shared liveness flag for one connection.
///
/// Cloned into the task that watches the peer; clearing it cancels every
/// task waiting on [`Liveness::cancelled`].
#[derive(Clone, Debug)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Liveness {
    fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            cancel: CancellationToken::new(),
        }
    }

    /// Whether the peer is still believed to be connected.
    #[must_use]
    pub fn is_alive(&self) -> bool { self.alive.load(Ordering::Acquire) }

    /// Record that the peer is gone and release tasks tied to it.
    pub fn mark_closed(&self) {
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    /// Resolve once the connection is closed locally or by the peer.
    pub async fn cancelled(&self) { self.cancel.cancelled().await; }
}

/// Reasons a send to one connection did not complete.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection was already closed or its peer went away.
    #[error("connection is not connected")]
    NotConnected,
    /// The write did not finish within the configured deadline.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    /// The transport reported an error.
    #[error("send failed: {0}")]
    Io(#[from] io::Error),
}

/// One accepted viewer socket.
pub struct Connection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    sink: Box<dyn FrameSink>,
    liveness: Liveness,
    closed: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("alive", &self.liveness.is_alive())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap a sink as a live connection.
    pub fn new(id: ConnectionId, peer_addr: Option<SocketAddr>, sink: impl FrameSink + 'static) -> Self {
        Self {
            id,
            peer_addr,
            sink: Box::new(sink),
            liveness: Liveness::new(),
            closed: false,
        }
    }

    /// Connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Remote address, when known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr }

    /// Handle sharing this connection's liveness flag.
    #[must_use]
    pub fn liveness(&self) -> Liveness { self.liveness.clone() }

    /// Whether the connection can still be written to.
    #[must_use]
    pub fn is_alive(&self) -> bool { !self.closed && self.liveness.is_alive() }

    /// Whether [`Connection::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed }

    /// Write one wire message, bounded by `limit` when set.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the connection is not alive, the write
    /// fails, or the deadline passes. Any failure clears the liveness flag.
    pub async fn send(&mut self, wire: &Bytes, limit: Option<Duration>) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::NotConnected);
        }
        let result = match limit {
            Some(limit) => match timeout(limit, self.sink.send_wire(wire)).await {
                Ok(result) => result.map_err(SendError::from),
                Err(_) => Err(SendError::Timeout(limit)),
            },
            None => self.sink.send_wire(wire).await.map_err(SendError::from),
        };
        if result.is_err() {
            self.liveness.mark_closed();
        }
        result
    }

    /// Close the connection. Repeated calls are no-ops.
    ///
    /// Errors while shutting the transport down are logged and swallowed.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.liveness.mark_closed();
        if let Err(e) = self.sink.close().await {
            debug!(id = %self.id, error = %e, "error while closing connection");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) { self.liveness.mark_closed(); }
}

/// Outcome of one broadcast pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that received the full wire message.
    pub delivered: usize,
    /// Connections removed during this pass.
    pub removed: Vec<ConnectionId>,
}

/// Mutex-guarded set of live connections.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: Mutex<BTreeMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
    max_frame_length: usize,
    send_timeout: Option<Duration>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH, Some(DEFAULT_SEND_TIMEOUT)) }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    ///
    /// The registry lock is held for the whole of a broadcast, so
    /// `send_timeout` bounds how long one stalled peer can delay
    /// [`register`](Self::register) and the next tick. With `None` a peer
    /// that stops reading blocks both indefinitely; only pass `None` when
    /// every sink is known to make progress.
    #[must_use]
    pub fn new(max_frame_length: usize, send_timeout: Option<Duration>) -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            max_frame_length: clamp_frame_length(max_frame_length),
            send_timeout,
        }
    }

    /// Per-connection send limit applied during a broadcast.
    #[must_use]
    pub fn send_timeout(&self) -> Option<Duration> { self.send_timeout }

    /// Allocate a fresh connection identifier.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a connection and return the new live count.
    pub async fn register(&self, connection: Connection) -> usize {
        let id = connection.id();
        let peer_addr = connection.peer_addr();
        let mut connections = self.connections.lock().await;
        if let Some(mut previous) = connections.insert(id, connection) {
            warn!(%id, "replacing connection registered under the same id");
            previous.close().await;
            metrics::dec_connections(1);
        }
        metrics::inc_connections();
        let total = connections.len();
        info!("client connected: id={id}, peer_addr={peer_addr:?}, total_clients={total}");
        total
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize { self.connections.lock().await.len() }

    /// Whether no connections are registered.
    pub async fn is_empty(&self) -> bool { self.connections.lock().await.is_empty() }

    /// Identifiers of every live connection in ascending order.
    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.connections.lock().await.keys().copied().collect()
    }

    /// Close and remove one connection.
    ///
    /// Returns `false` if `id` was not registered.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().await.remove(&id);
        match removed {
            Some(mut connection) => {
                connection.close().await;
                metrics::dec_connections(1);
                true
            }
            None => false,
        }
    }

    /// Send `frame` to every registered connection.
    ///
    /// Connections that fail are closed and removed after the pass, so a
    /// call either delivers the whole wire message to a connection or
    /// removes it.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError`] without touching any connection if the frame
    /// exceeds the configured bound.
    pub async fn broadcast(&self, frame: &Frame) -> Result<BroadcastReport, FramingError> {
        if frame.len() > self.max_frame_length {
            return Err(FramingError::OversizedFrame {
                size: frame.len(),
                max: self.max_frame_length,
            });
        }
        let wire = wire_message(frame)?;
        let limit = self.send_timeout;

        let mut connections = self.connections.lock().await;
        if connections.is_empty() {
            return Ok(BroadcastReport::default());
        }

        let sends = connections.values_mut().map(|connection| {
            let wire = &wire;
            async move { (connection.id(), connection.send(wire, limit).await) }
        });
        let outcomes = join_all(sends).await;

        let mut report = BroadcastReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(%id, error = %e, "dropping connection after failed send");
                    report.removed.push(id);
                }
            }
        }

        for id in &report.removed {
            if let Some(mut connection) = connections.remove(id) {
                connection.close().await;
            }
        }
        metrics::inc_frames_broadcast();
        if !report.removed.is_empty() {
            let removed = report.removed.len();
            metrics::dec_connections(removed);
            metrics::inc_pruned(removed);
            info!(
                "removed {removed} disconnected clients; active_clients={}",
                connections.len()
            );
        }
        Ok(report)
    }

    /// Close and remove every connection, returning how many were closed.
    ///
    /// Each close is attempted independently; failures are logged only.
    pub async fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.connections.lock().await);
        let count = drained.len();
        for (_, mut connection) in drained {
            connection.close().await;
        }
        if count > 0 {
            metrics::dec_connections(count);
        }
        count
    }
}
