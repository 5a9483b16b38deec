//! Viewer-side client.
//!
//! A [`FrameClient`] connects to a frame server, reassembles the inbound
//! byte stream into frames and hands each one to a
//! [`FrameConsumer`](crate::consumer::FrameConsumer). It never writes to the
//! server.

mod activity;
mod error;
mod runtime;
#[cfg(test)]
mod tests;

pub use error::ClientError;
pub use runtime::{FrameClient, SessionEnd};
