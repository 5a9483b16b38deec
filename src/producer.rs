//! Frame producers and the periodic loop that broadcasts their output.
//!
//! A [`FrameProducer`] yields one frame per tick. [`production_loop`] drives
//! it on a fixed interval and hands every frame to the
//! [`ConnectionRegistry`]. Errors from either side are logged and the loop
//! carries on with the next tick.

use std::{convert::Infallible, error::Error, sync::Arc, time::Duration};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    frame::Frame,
    metrics,
    raster::{RasterCodec, RasterError, RasterImage, Rect, Rgb},
    registry::ConnectionRegistry,
};

/// Source of frames for the broadcaster.
pub trait FrameProducer: Send {
    /// Error raised when a frame cannot be produced.
    type Error: Error + Send + Sync + 'static;

    /// Produce the next frame.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if no frame is available for this tick.
    fn produce(&mut self) -> Result<Frame, Self::Error>;
}

/// Horizontal position of a square that bounces between two walls.
///
/// Each tick moves the square ten pixels. A step that would carry it past
/// either wall is reversed before it is applied, so the position never
/// leaves `[min_x, max_x]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BouncingRect {
    x: i32,
    step: i32,
    min_x: i32,
    max_x: i32,
}

/// Canvas width of the demonstration scene.
pub const SCENE_WIDTH: u32 = 600;
/// Canvas height of the demonstration scene.
pub const SCENE_HEIGHT: u32 = 400;
/// Side length of the bouncing square.
pub const RECT_SIZE: u32 = 30;
/// Fixed vertical position of the square.
pub const RECT_Y: i32 = 20;

const START_X: i32 = 20;
const STEP: i32 = 10;
const RIGHT_MARGIN: i32 = 60;

impl Default for BouncingRect {
    fn default() -> Self { Self::for_canvas(SCENE_WIDTH, RECT_SIZE) }
}

impl BouncingRect {
    /// Bounds for a square of side `size` on a canvas `width` pixels wide.
    ///
    /// The left wall sits at half the square's size and the right wall sixty
    /// pixels short of the canvas edge.
    #[must_use]
    pub fn for_canvas(width: u32, size: u32) -> Self {
        let min_x = i32::try_from(size / 2).unwrap_or(i32::MAX);
        let max_x = i32::try_from(width)
            .unwrap_or(i32::MAX)
            .saturating_sub(RIGHT_MARGIN)
            .max(min_x);
        Self {
            x: START_X.clamp(min_x, max_x),
            step: STEP,
            min_x,
            max_x,
        }
    }

    /// Current left edge of the square.
    #[must_use]
    pub fn x(&self) -> i32 { self.x }

    /// Lowest reachable position.
    #[must_use]
    pub fn min_x(&self) -> i32 { self.min_x }

    /// Highest reachable position.
    #[must_use]
    pub fn max_x(&self) -> i32 { self.max_x }

    /// Advance one tick and return the new position.
    pub fn tick(&mut self) -> i32 {
        if self.x + self.step > self.max_x {
            self.step = -STEP;
        } else if self.x + self.step < self.min_x {
            self.step = STEP;
        }
        self.x = (self.x + self.step).clamp(self.min_x, self.max_x);
        self.x
    }
}

/// Renders the bouncing square scene into raster frames.
#[derive(Clone, Debug, Default)]
pub struct RenderedProducer {
    motion: BouncingRect,
    codec: RasterCodec,
}

impl RenderedProducer {
    /// Current state of the animation.
    #[must_use]
    pub fn motion(&self) -> BouncingRect { self.motion }

    /// Draw the scene with the square at `x`.
    #[must_use]
    pub fn render(x: i32) -> RasterImage {
        let mut image = RasterImage::new(SCENE_WIDTH, SCENE_HEIGHT, Rgb::WHITE);
        let rect = Rect::new(x, RECT_Y, RECT_SIZE, RECT_SIZE);
        image.fill_rect(rect, Rgb::BLUE);
        image.stroke_rect(rect, Rgb::RED);
        image
    }
}

impl FrameProducer for RenderedProducer {
    type Error = RasterError;

    fn produce(&mut self) -> Result<Frame, Self::Error> {
        let x = self.motion.tick();
        self.codec.encode(&Self::render(x))
    }
}

/// Producer that replays a fixed sequence of frames, cycling forever.
#[derive(Clone, Debug)]
pub struct CyclingProducer {
    frames: Vec<Frame>,
    next: usize,
}

impl CyclingProducer {
    /// Cycle through `frames`; an empty list yields empty frames.
    #[must_use]
    pub fn new(frames: Vec<Frame>) -> Self { Self { frames, next: 0 } }
}

impl FrameProducer for CyclingProducer {
    type Error = Infallible;

    fn produce(&mut self) -> Result<Frame, Self::Error> {
        let Some(frame) = self.frames.get(self.next).cloned() else {
            return Ok(Frame::default());
        };
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }
}

/// Produce and broadcast one frame every `interval` until `shutdown` fires.
///
/// Ticks missed while a broadcast was still running are skipped rather than
/// bursted.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub async fn production_loop<P>(
    mut producer: P,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) where
    P: FrameProducer,
{
    let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let frame = match producer.produce() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame production failed; skipping tick");
                metrics::inc_errors("produce");
                continue;
            }
        };
        match registry.broadcast(&frame).await {
            Ok(report) => debug!(
                delivered = report.delivered,
                removed = report.removed.len(),
                "frame broadcast"
            ),
            Err(e) => {
                warn!(error = %e, "frame not broadcast");
                metrics::inc_errors("broadcast");
            }
        }
    }
    debug!("production loop stopped");
}
