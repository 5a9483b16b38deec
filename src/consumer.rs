//! Frame consumers for the viewer side.
//!
//! The client hands every reassembled payload to a [`FrameConsumer`]. The
//! consumer must return promptly, since it runs on the read path. Work that
//! may take longer, such as decoding and painting, belongs behind
//! [`LatestFrame`], which publishes the newest frame on a watch channel and
//! lets [`display_loop`] pick it up on its own task. Frames superseded before
//! the display task wakes are skipped, never queued.

use log::info;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    frame::Frame,
    metrics,
    raster::{RasterCodec, RasterImage},
};

/// Receiver of reassembled frames.
pub trait FrameConsumer: Send {
    /// Accept one complete payload.
    fn display(&mut self, frame: Frame);

    /// The connection to the server has ended.
    fn connection_lost(&mut self) {}
}

/// What a viewer currently has to show.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ViewState {
    /// No frame has arrived yet.
    #[default]
    Waiting,
    /// The most recent frame and its position in the stream, counting from one.
    Frame {
        /// Number of frames received so far, including this one.
        sequence: u64,
        /// Payload bytes.
        frame: Frame,
    },
    /// The server connection is gone.
    Disconnected,
}

/// Consumer that publishes the newest frame without blocking.
#[derive(Debug)]
pub struct LatestFrame {
    tx: watch::Sender<ViewState>,
    received: u64,
}

/// Read side of a [`LatestFrame`].
#[derive(Clone, Debug)]
pub struct FrameWatch {
    rx: watch::Receiver<ViewState>,
}

impl LatestFrame {
    /// Create a consumer together with the handle used to observe it.
    #[must_use]
    pub fn new() -> (Self, FrameWatch) {
        let (tx, rx) = watch::channel(ViewState::Waiting);
        (Self { tx, received: 0 }, FrameWatch { rx })
    }

    /// Frames accepted so far.
    #[must_use]
    pub fn received(&self) -> u64 { self.received }
}

impl FrameConsumer for LatestFrame {
    fn display(&mut self, frame: Frame) {
        self.received += 1;
        self.tx.send_replace(ViewState::Frame {
            sequence: self.received,
            frame,
        });
    }

    fn connection_lost(&mut self) { self.tx.send_replace(ViewState::Disconnected); }
}

impl FrameWatch {
    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ViewState { self.rx.borrow().clone() }

    /// The newest frame, if one has arrived.
    #[must_use]
    pub fn latest_frame(&self) -> Option<Frame> {
        match &*self.rx.borrow() {
            ViewState::Frame { frame, .. } => Some(frame.clone()),
            _ => None,
        }
    }

    /// Wait for the state to change and return the new value.
    ///
    /// Returns `None` once the publishing consumer has been dropped.
    pub async fn changed(&mut self) -> Option<ViewState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Something that can present a decoded image.
pub trait ImageDisplay: Send {
    /// Present `image`, replacing whatever was shown before.
    fn show(&mut self, image: &RasterImage);
}

/// Display that logs a line per image instead of painting it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDisplay {
    shown: u64,
}

impl LoggingDisplay {
    /// Images presented so far.
    #[must_use]
    pub fn shown(&self) -> u64 { self.shown }
}

impl ImageDisplay for LoggingDisplay {
    fn show(&mut self, image: &RasterImage) {
        self.shown += 1;
        info!(
            "frame {}: {}x{} image",
            self.shown,
            image.width(),
            image.height()
        );
    }
}

/// Consumer that decodes payloads as raster images before display.
///
/// Payloads that are not valid images are dropped with a warning and the
/// stream carries on.
#[derive(Debug, Default)]
pub struct DecodingConsumer<D> {
    codec: RasterCodec,
    display: D,
    dropped: u64,
}

impl<D> DecodingConsumer<D> {
    /// Wrap `display`.
    pub fn new(display: D) -> Self {
        Self {
            codec: RasterCodec,
            display,
            dropped: 0,
        }
    }

    /// The wrapped display.
    pub fn display_ref(&self) -> &D { &self.display }

    /// Payloads discarded because they did not decode.
    #[must_use]
    pub fn dropped(&self) -> u64 { self.dropped }
}

impl<D: ImageDisplay> FrameConsumer for DecodingConsumer<D> {
    fn display(&mut self, frame: Frame) {
        match self.codec.decode(frame.as_ref()) {
            Ok(image) => self.display.show(&image),
            Err(e) => {
                self.dropped += 1;
                metrics::inc_errors("decode");
                warn!(error = %e, len = frame.len(), "dropping undecodable frame");
            }
        }
    }
}

/// Feed frames published through `watch` into `consumer` until the
/// connection is lost or the publisher goes away.
pub async fn display_loop<C>(mut watch: FrameWatch, mut consumer: C) -> C
where
    C: FrameConsumer,
{
    while let Some(state) = watch.changed().await {
        match state {
            ViewState::Waiting => {}
            ViewState::Frame { sequence, frame } => {
                debug!(sequence, "displaying frame");
                consumer.display(frame);
            }
            ViewState::Disconnected => {
                consumer.connection_lost();
                break;
            }
        }
    }
    consumer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Rgb;

    #[derive(Default)]
    struct Collect {
        frames: Vec<Frame>,
        lost: bool,
    }

    impl FrameConsumer for Collect {
        fn display(&mut self, frame: Frame) { self.frames.push(frame); }

        fn connection_lost(&mut self) { self.lost = true; }
    }

    #[test]
    fn latest_frame_keeps_only_newest() {
        let (mut consumer, watch) = LatestFrame::new();
        assert_eq!(watch.state(), ViewState::Waiting);
        assert!(watch.latest_frame().is_none());

        consumer.display(Frame::from(vec![1_u8]));
        consumer.display(Frame::from(vec![2_u8]));

        assert_eq!(watch.latest_frame(), Some(Frame::from(vec![2_u8])));
        assert!(matches!(watch.state(), ViewState::Frame { sequence: 2, .. }));
        assert_eq!(consumer.received(), 2);
    }

    #[test]
    fn decoding_consumer_drops_invalid_payloads() {
        let mut consumer = DecodingConsumer::new(LoggingDisplay::default());
        consumer.display(Frame::from(vec![0xff_u8; 3]));
        let image = RasterImage::new(2, 2, Rgb::RED);
        consumer.display(RasterCodec.encode(&image).expect("encode"));

        assert_eq!(consumer.dropped(), 1);
        assert_eq!(consumer.display_ref().shown(), 1);
    }

    #[tokio::test]
    async fn display_loop_runs_until_disconnect() {
        let (mut publisher, watch) = LatestFrame::new();
        let task = tokio::spawn(display_loop(watch, Collect::default()));

        publisher.display(Frame::from(vec![7_u8]));
        tokio::task::yield_now().await;
        publisher.connection_lost();

        let collected = task.await.expect("display task");
        assert!(collected.lost);
        assert!(collected.frames.len() <= 1);
    }

    #[tokio::test]
    async fn display_loop_ends_when_publisher_is_dropped() {
        let (publisher, watch) = LatestFrame::new();
        drop(publisher);
        let collected = display_loop(watch, Collect::default()).await;
        assert!(collected.frames.is_empty());
        assert!(!collected.lost);
    }
}
