// SPDX-License-Identifier: GPL-3.0-only

//! UVC camera preview engine
//!
//! Runs a camera's streaming session end to end: negotiates a pixel format
//! the device actually supports, ingests frames from the USB transport on
//! its threads, and fans them out to a display surface and a host frame
//! callback, with bounded memory and backpressure by drop.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: lifecycle controller plus the preview and capture workers
//! - [`negotiation`]: format selection against the device's descriptors
//! - [`convert`]: pixel format converters for both consumer stages
//! - [`pool`]: bounded recycler of frame buffers
//! - [`transport`]: the seam to the USB/UVC stack
//! - [`surface`]: the seam to the windowing system
//!
//! Data flows transport → ingest → preview queue → preview worker →
//! {preview surface, capture slot} → capture worker → {capture surface,
//! host callback}. The preview queue is a bounded FIFO that drops the
//! newest frame when full; the capture slot keeps only the latest frame.
//! A slow consumer therefore costs frames, never memory, and never blocks
//! the transport.

pub mod config;
pub mod constants;
pub mod convert;
pub mod errors;
pub mod frame;
pub mod negotiation;
pub mod pool;
pub mod session;
pub mod surface;
pub mod transport;

// Re-export the types a host touches for every session
pub use config::{FrameType, StreamRequest};
pub use errors::{ConvertError, SessionError, SurfaceError, TransportError};
pub use frame::{CallbackFormat, FrameFormat, RawFrame};
pub use negotiation::NegotiatedStream;
pub use session::{CameraSession, FrameCallback, SessionState};
pub use surface::{Surface, SurfaceBuffer, SurfaceGeometry, WindowFormat};
pub use transport::{
    DescriptorSubtype, FormatDescriptor, FrameDescriptor, FrameSink, StreamCtrl, StreamTransport,
};
