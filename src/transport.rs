// SPDX-License-Identifier: GPL-3.0-only

//! USB/UVC transport abstraction
//!
//! The engine never touches USB itself. Everything it needs from the
//! device side goes through [`StreamTransport`]: descriptor enumeration,
//! format negotiation, and asynchronous frame delivery. A production
//! implementation wraps a UVC stack; the test suite uses an in-memory fake.

use crate::errors::TransportResult;
use crate::frame::{FrameFormat, RawFrame};
use std::sync::Arc;

/// Negotiated stream-control descriptor.
///
/// Fixes the (format, size, rate) tuple the device agreed to, plus the
/// device-side descriptor indices needed to resolve the exact frame
/// geometry later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCtrl {
    /// Stream format the device accepted.
    pub format: FrameFormat,
    /// Accepted width in pixels.
    pub width: u32,
    /// Accepted height in pixels.
    pub height: u32,
    /// Accepted frame rate.
    pub fps: u32,
    /// Device-side format descriptor index.
    pub format_index: u8,
    /// Device-side frame descriptor index.
    pub frame_index: u8,
}

/// Subtype of a video-streaming format or frame descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSubtype {
    /// Uncompressed (raw YUV) descriptor.
    Uncompressed,
    /// Motion JPEG descriptor.
    Mjpeg,
    /// Frame-based descriptor (H.264 and friends).
    FrameBased,
    /// Any other subtype, carried by its wire value.
    Other(u8),
}

/// One format descriptor advertised by the device, in stream-interface
/// order followed by format order.
#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    /// Descriptor subtype.
    pub subtype: DescriptorSubtype,
    /// Format GUID; for uncompressed streams the first four bytes are an
    /// ASCII FourCC such as `NV12` or `I420`.
    pub guid: [u8; 16],
}

impl FormatDescriptor {
    /// First four GUID bytes, the FourCC of an uncompressed format.
    pub fn fourcc(&self) -> [u8; 4] {
        [self.guid[0], self.guid[1], self.guid[2], self.guid[3]]
    }
}

/// Exact frame geometry resolved from a negotiated stream control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Subtype of the descriptor the control points at.
    pub subtype: DescriptorSubtype,
}

/// Per-frame delivery callback handed to [`StreamTransport::start_streaming`].
///
/// The transport invokes it from its own thread(s) with a borrowed frame;
/// the borrow ends when the callback returns, so anything the engine wants
/// to keep must be copied out.
pub type FrameSink = Arc<dyn Fn(&RawFrame) + Send + Sync>;

/// Interface the engine requires from the USB/UVC transport layer.
pub trait StreamTransport: Send + Sync {
    /// Ask the device for a stream control matching the given format, size
    /// and rate.
    ///
    /// # Arguments
    /// * `format` - Stream format to request
    /// * `width`, `height` - Requested frame size in pixels
    /// * `fps` - Requested frame rate
    fn negotiate(
        &self,
        format: FrameFormat,
        width: u32,
        height: u32,
        fps: u32,
    ) -> TransportResult<StreamCtrl>;

    /// Enumerate the device's format descriptors, in stream-interface order
    /// then format order.
    fn format_descriptors(&self) -> Vec<FormatDescriptor>;

    /// Resolve the exact frame descriptor a stream control points at.
    fn frame_descriptor(&self, ctrl: &StreamCtrl) -> TransportResult<FrameDescriptor>;

    /// Start streaming with the given control; delivered frames are handed
    /// to `sink` on the transport's thread(s) until [`stop_streaming`] is
    /// called.
    ///
    /// [`stop_streaming`]: StreamTransport::stop_streaming
    fn start_streaming(&self, ctrl: &StreamCtrl, sink: FrameSink) -> TransportResult<()>;

    /// Stop an active stream. No-op when nothing is streaming.
    fn stop_streaming(&self);
}
