//! Raster images and the frame codec used to ship them.
//!
//! Frames are opaque to the transport; this module is the one place that
//! knows what they contain. A [`RasterImage`] is an RGB8 pixel buffer, and
//! [`RasterCodec`] turns it into frame bytes with `bincode` and back.

use bincode::{
    Decode,
    Encode,
    error::{DecodeError, EncodeError},
};
use thiserror::Error;

use crate::frame::{Frame, MAX_FRAME_LENGTH_LIMIT};

/// An RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Opaque white.
    pub const WHITE: Self = Self(0xff, 0xff, 0xff);
    /// Pure red.
    pub const RED: Self = Self(0xff, 0x00, 0x00);
    /// Pure blue.
    pub const BLUE: Self = Self(0x00, 0x00, 0xff);
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Build a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

const CHANNELS: usize = 3;

/// RGB8 raster image stored row-major.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Create an image filled with `background`.
    #[must_use]
    pub fn new(width: u32, height: u32, background: Rgb) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&[background.0, background.1, background.2]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 { self.width }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 { self.height }

    /// Colour at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let offset = self.offset(x, y)?;
        match self.pixels.get(offset..offset + CHANNELS)? {
            [r, g, b] => Some(Rgb(*r, *g, *b)),
            _ => None,
        }
    }

    /// Set the colour at `(x, y)`; coordinates outside the image are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, colour: Rgb) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        if let Some(slot) = self.pixels.get_mut(offset..offset + CHANNELS) {
            slot.copy_from_slice(&[colour.0, colour.1, colour.2]);
        }
    }

    /// Fill `rect`, clipped to the image bounds.
    pub fn fill_rect(&mut self, rect: Rect, colour: Rgb) {
        let (x0, y0) = (i64::from(rect.x), i64::from(rect.y));
        for y in y0..y0 + i64::from(rect.height) {
            for x in x0..x0 + i64::from(rect.width) {
                self.set_pixel(x, y, colour);
            }
        }
    }

    /// Draw the one-pixel outline of `rect`, clipped to the image bounds.
    pub fn stroke_rect(&mut self, rect: Rect, colour: Rgb) {
        let (x0, y0) = (i64::from(rect.x), i64::from(rect.y));
        let (x1, y1) = (x0 + i64::from(rect.width), y0 + i64::from(rect.height));
        for x in x0..=x1 {
            self.set_pixel(x, y0, colour);
            self.set_pixel(x, y1, colour);
        }
        for y in y0..=y1 {
            self.set_pixel(x0, y, colour);
            self.set_pixel(x1, y, colour);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * CHANNELS)
    }

    fn expected_len(&self) -> usize { self.width as usize * self.height as usize * CHANNELS }
}

/// Errors raised by [`RasterCodec`].
#[derive(Debug, Error)]
pub enum RasterError {
    /// Serialising the image failed.
    #[error("failed to encode raster image: {0}")]
    Encode(#[from] EncodeError),
    /// The frame bytes do not describe an image.
    #[error("failed to decode raster image: {0}")]
    Decode(#[from] DecodeError),
    /// The pixel buffer does not match the declared dimensions.
    #[error("pixel buffer holds {actual} bytes but {width}x{height} needs {expected}")]
    Dimensions {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Bytes required by the dimensions.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
    /// Bytes remained after the image was decoded.
    #[error("{0} trailing bytes after raster image")]
    TrailingBytes(usize),
}

/// Frame codec for [`RasterImage`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterCodec;

impl RasterCodec {
    /// Encode `image` as a self-contained frame.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Encode`] if serialisation fails.
    pub fn encode(self, image: &RasterImage) -> Result<Frame, RasterError> {
        let bytes = bincode::encode_to_vec(image, bincode::config::standard())?;
        Ok(Frame::from(bytes))
    }

    /// Decode a frame payload back into an image.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError`] if the bytes are not a well-formed image.
    ///
    /// # Examples
    ///
    /// ```
    /// use framecast::raster::{RasterCodec, RasterImage, Rgb};
    ///
    /// let image = RasterImage::new(4, 2, Rgb::WHITE);
    /// let frame = RasterCodec.encode(&image).expect("encode");
    /// assert_eq!(RasterCodec.decode(frame.as_ref()).expect("decode"), image);
    /// ```
    pub fn decode(self, bytes: &[u8]) -> Result<RasterImage, RasterError> {
        // Length fields come off the wire; cap what bincode may allocate.
        let config = bincode::config::standard().with_limit::<{ MAX_FRAME_LENGTH_LIMIT }>();
        let (image, read): (RasterImage, usize) = bincode::decode_from_slice(bytes, config)?;
        if read != bytes.len() {
            return Err(RasterError::TrailingBytes(bytes.len() - read));
        }
        if image.pixels.len() != image.expected_len() {
            return Err(RasterError::Dimensions {
                width: image.width,
                height: image.height,
                expected: image.expected_len(),
                actual: image.pixels.len(),
            });
        }
        Ok(image)
    }
}
