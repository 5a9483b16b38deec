//! Public API for the `framecast` library.
//!
//! A frame server renders images on a fixed tick and pushes each one to every
//! connected viewer as a length-prefixed wire message. Viewers reassemble the
//! byte stream into frames and hand them to a consumer for display.

pub mod byte_order;
pub mod client;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod frame;
pub mod metrics;
pub mod producer;
pub mod raster;
pub mod registry;
pub mod server;

pub use client::{ClientError, FrameClient, SessionEnd};
pub use codec::{CodecError, LengthPrefixedCodec, Reassembler, RecoveryPolicy};
pub use frame::Frame;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use server::{FrameServer, ServerError};
