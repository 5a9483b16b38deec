//! Viewer client runtime implementation.

use std::{fmt, net::SocketAddr, time::Duration};

use futures::StreamExt;
use log::{info, warn};
use tokio::{
    io::AsyncRead,
    net::TcpStream,
    time::{Instant, timeout_at},
};
use tokio_util::codec::FramedRead;
use tracing::debug;

use super::{ClientError, activity::ActivityReader};
use crate::{
    codec::{CodecError, FrameDecoder, LengthPrefixedCodec, Reassembler},
    config::ClientConfig,
    consumer::FrameConsumer,
    frame::Frame,
    metrics,
};

/// Client runtime for a single viewer connection.
///
/// # Examples
///
/// ```no_run
/// use framecast::{client::FrameClient, config::ClientConfig, consumer::LatestFrame};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), framecast::client::ClientError> {
/// let client = FrameClient::connect(&ClientConfig::default()).await?;
/// let (mut latest, _watch) = LatestFrame::new();
/// let end = client.run(&mut latest).await;
/// println!("received {} frames", end.frames_received);
/// # Ok(())
/// # }
/// ```
pub struct FrameClient<T = TcpStream>
where
    T: AsyncRead + Unpin,
{
    framed: FramedRead<ActivityReader<T>, FrameDecoder>,
    read_timeout: Option<Duration>,
    peer_addr: Option<SocketAddr>,
    received: u64,
}

impl<T> fmt::Debug for FrameClient<T>
where
    T: AsyncRead + Unpin,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClient")
            .field("peer_addr", &self.peer_addr)
            .field("read_timeout", &self.read_timeout)
            .field("received", &self.received)
            .finish_non_exhaustive()
    }
}

/// How a viewer session ended.
#[derive(Debug)]
pub struct SessionEnd {
    /// Frames delivered to the consumer.
    pub frames_received: u64,
    /// Why the session stopped, or `None` if the server closed cleanly.
    pub error: Option<ClientError>,
}

impl SessionEnd {
    /// Whether the server closed the connection at a frame boundary.
    #[must_use]
    pub fn is_clean(&self) -> bool { self.error.is_none() }
}

impl FrameClient<TcpStream> {
    /// Connect to the server named in `config`.
    ///
    /// Connection failures are returned to the caller and never retried.
    ///
    /// # Errors
    /// Returns [`ClientError::Connect`] if the TCP connection cannot be
    /// established.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let addr = config.server_addr_value();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to disable Nagle");
        }
        info!("connected to server: addr={addr}");
        let mut client = Self::from_stream(stream, config);
        client.peer_addr = Some(addr);
        Ok(client)
    }
}

impl<T> FrameClient<T>
where
    T: AsyncRead + Unpin,
{
    /// Wrap an already connected byte stream.
    pub fn from_stream(stream: T, config: &ClientConfig) -> Self {
        let codec = LengthPrefixedCodec::new(config.max_frame_length_value())
            .with_recovery_policy(config.recovery_policy_value());
        Self {
            framed: FramedRead::new(ActivityReader::new(stream), codec.decoder()),
            read_timeout: config.read_timeout_value(),
            peer_addr: None,
            received: 0,
        }
    }

    /// Server address, when connected over TCP.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr }

    /// Frames returned so far.
    #[must_use]
    pub fn frames_received(&self) -> u64 { self.received }

    /// Reassembly state for the inbound stream.
    #[must_use]
    pub fn reassembler(&self) -> &Reassembler { self.framed.decoder().reassembler() }

    /// Wait for the next complete frame.
    ///
    /// Returns `Ok(None)` when the server closes the connection at a frame
    /// boundary.
    ///
    /// The read timeout measures silence, not frame duration: a frame may
    /// take any time to arrive as long as no gap between reads exceeds the
    /// limit.
    ///
    /// # Errors
    /// Returns [`ClientError::Timeout`] if a read timeout is configured and
    /// no bytes arrive for that long, [`ClientError::Io`] on transport
    /// failure, or [`ClientError::Codec`] if the stream ends mid-message or
    /// carries a frame the recovery policy rejects.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, ClientError> {
        let next = match self.read_timeout {
            Some(limit) => self.next_before_idle(limit).await?,
            None => self.framed.next().await,
        };
        match next {
            Some(Ok(frame)) => {
                self.received += 1;
                Ok(Some(frame))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Poll the decoder, re-arming the deadline whenever bytes arrive.
    ///
    /// `FramedRead::next` is cancel safe, so abandoning it at a deadline
    /// keeps partially read frames buffered.
    async fn next_before_idle(
        &mut self,
        limit: Duration,
    ) -> Result<Option<Result<Frame, CodecError>>, ClientError> {
        self.framed.get_mut().touch();
        loop {
            let deadline = self.framed.get_ref().last_progress() + limit;
            if let Ok(next) = timeout_at(deadline, self.framed.next()).await {
                return Ok(next);
            }
            if Instant::now() >= self.framed.get_ref().last_progress() + limit {
                return Err(ClientError::Timeout(limit));
            }
        }
    }

    /// Wait for the next frame, treating a clean close as an error.
    ///
    /// # Errors
    /// Returns [`ClientError::Disconnected`] if the server closes the
    /// connection, or any error from [`FrameClient::next_frame`].
    pub async fn receive(&mut self) -> Result<Frame, ClientError> {
        self.next_frame().await?.ok_or(ClientError::Disconnected)
    }

    /// Deliver frames to `consumer` until the connection ends.
    ///
    /// The consumer is told about the lost connection before this returns.
    pub async fn run<C>(mut self, consumer: &mut C) -> SessionEnd
    where
        C: FrameConsumer + ?Sized,
    {
        let error = loop {
            match self.next_frame().await {
                Ok(Some(frame)) => consumer.display(frame),
                Ok(None) => break None,
                Err(e) => break Some(e),
            }
        };
        match &error {
            None => info!("server closed connection: frames_received={}", self.received),
            Some(e) => {
                warn!(
                    "connection to server lost: error={e}, frames_received={}",
                    self.received
                );
                metrics::inc_errors("receive");
            }
        }
        let dropped = self.reassembler().dropped_frames();
        if dropped > 0 {
            warn!("discarded {dropped} oversized frames during session");
        }
        consumer.connection_lost();
        SessionEnd {
            frames_received: self.received,
            error,
        }
    }
}
