// SPDX-License-Identifier: GPL-3.0-only

//! Frame buffers and pixel formats
//!
//! [`RawFrame`] is the unit of exchange through the whole pipeline: the
//! transport delivers one per captured image, the pool recycles them, and
//! the workers move them between stages by value. Ownership is exclusive;
//! there is no shared aliasing of payload memory anywhere in the engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stream pixel/compression format as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Motion JPEG; payload size varies per frame.
    Mjpeg,
    /// Packed YUV 4:2:2 (Y0 U Y1 V).
    Yuyv,
    /// Semi-planar YUV 4:2:0, interleaved UV plane.
    Nv12,
    /// Semi-planar YUV 4:2:0, interleaved VU plane.
    Nv21,
    /// Planar YUV 4:2:0 with separate U and V planes.
    I420,
    /// 32-bit RGB with a padding byte.
    Rgbx,
    /// 24-bit RGB.
    Rgb,
    /// 24-bit BGR.
    Bgr,
    /// Negotiation placeholder for an uncompressed stream; resolved to a
    /// concrete raw format before streaming starts.
    Uncompressed,
    /// Frame-based H.264 stream.
    H264,
    /// Anything else, carried by FourCC.
    Other([u8; 4]),
}

impl FrameFormat {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            FrameFormat::Mjpeg => "MJPEG",
            FrameFormat::Yuyv => "YUYV",
            FrameFormat::Nv12 => "NV12",
            FrameFormat::Nv21 => "NV21",
            FrameFormat::I420 => "I420",
            FrameFormat::Rgbx => "RGBX",
            FrameFormat::Rgb => "RGB",
            FrameFormat::Bgr => "BGR",
            FrameFormat::Uncompressed => "UNCOMPRESSED",
            FrameFormat::H264 => "H264",
            FrameFormat::Other(_) => "OTHER",
        }
    }

    /// Minimum payload size in bytes for a frame of this format.
    ///
    /// Returns 0 when the dimensions are invalid for the format (zero sized,
    /// or odd dimensions for the 4:2:0 families). MJPEG payloads vary per
    /// frame, so anything non-empty passes; the decoder is the real gate.
    pub fn min_frame_bytes(&self, width: u32, height: u32) -> usize {
        if width == 0 || height == 0 {
            return 0;
        }
        let wh = width as usize * height as usize;
        match self {
            FrameFormat::Yuyv => wh * 2,
            FrameFormat::Nv12 | FrameFormat::Nv21 | FrameFormat::I420 => {
                if width % 2 != 0 || height % 2 != 0 {
                    0
                } else {
                    wh * 3 / 2
                }
            }
            FrameFormat::Rgbx => wh * 4,
            FrameFormat::Rgb | FrameFormat::Bgr => wh * 3,
            FrameFormat::Mjpeg => 1,
            _ => 1,
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-facing callback pixel format.
///
/// The discriminants are the stable wire values used by
/// `CameraSession::set_frame_callback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum CallbackFormat {
    Raw = 0,
    Yuv = 1,
    Rgb565 = 2,
    Rgbx = 3,
    Nv21 = 4,
    Nv12 = 5,
    Rgb = 6,
    Bgr = 7,
    I420 = 8,
}

impl CallbackFormat {
    /// Decode the wire value used by the host API.
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(CallbackFormat::Raw),
            1 => Some(CallbackFormat::Yuv),
            2 => Some(CallbackFormat::Rgb565),
            3 => Some(CallbackFormat::Rgbx),
            4 => Some(CallbackFormat::Nv21),
            5 => Some(CallbackFormat::Nv12),
            6 => Some(CallbackFormat::Rgb),
            7 => Some(CallbackFormat::Bgr),
            8 => Some(CallbackFormat::I420),
            _ => None,
        }
    }

    /// Wire value of this format.
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Callback payload size in bytes for a `width`×`height` frame.
    ///
    /// Returns 0 when the dimensions are invalid for the format.
    pub fn frame_bytes(self, width: u32, height: u32) -> usize {
        if width == 0 || height == 0 {
            return 0;
        }
        let wh = width as usize * height as usize;
        match self {
            CallbackFormat::Raw | CallbackFormat::Yuv | CallbackFormat::Rgb565 => wh * 2,
            CallbackFormat::Nv12 | CallbackFormat::Nv21 | CallbackFormat::I420 => {
                if width % 2 != 0 || height % 2 != 0 {
                    0
                } else {
                    wh * 3 / 2
                }
            }
            CallbackFormat::Rgb | CallbackFormat::Bgr => wh * 3,
            CallbackFormat::Rgbx => wh * 4,
        }
    }

    /// True when a device frame in `format` can be handed to the host
    /// without conversion.
    pub fn passthrough_matches(self, format: FrameFormat) -> bool {
        match self {
            CallbackFormat::Raw | CallbackFormat::Yuv => format == FrameFormat::Yuyv,
            CallbackFormat::Nv12 => format == FrameFormat::Nv12,
            CallbackFormat::Nv21 => format == FrameFormat::Nv21,
            CallbackFormat::I420 => format == FrameFormat::I420,
            _ => false,
        }
    }
}

/// One frame buffer moving through the pipeline.
///
/// `data.len()` is the payload size; the `Vec` capacity is what the pool
/// preserves across recycling. Header fields describe the payload currently
/// stored, not the buffer's history.
#[derive(Debug)]
pub struct RawFrame {
    /// Payload format.
    pub format: FrameFormat,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Row stride of the payload in bytes (0 when packed/unknown).
    pub step: usize,
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Transport sequence number, when the transport provides one.
    pub sequence: Option<u64>,
    /// Capture timestamp relative to stream start, when provided.
    pub timestamp: Option<Duration>,
}

impl RawFrame {
    /// Allocate an empty frame whose buffer can hold at least `bytes`.
    ///
    /// Returns `None` when the allocation fails; the caller drops the frame
    /// it wanted to store.
    pub fn with_capacity(bytes: usize) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes).ok()?;
        Some(Self {
            format: FrameFormat::Other([0; 4]),
            width: 0,
            height: 0,
            step: 0,
            data,
            sequence: None,
            timestamp: None,
        })
    }

    /// Payload size in bytes.
    pub fn data_bytes(&self) -> usize {
        self.data.len()
    }

    /// Grow the buffer capacity to at least `bytes`, preserving contents.
    ///
    /// Returns false when the allocation fails.
    pub fn ensure_capacity(&mut self, bytes: usize) -> bool {
        let needed = bytes.saturating_sub(self.data.len());
        if self.data.capacity() >= bytes {
            return true;
        }
        self.data.try_reserve_exact(needed).is_ok()
    }

    /// Deep-copy header and payload from `src`, growing capacity as needed.
    ///
    /// Returns false (leaving `self` cleared) when the allocation fails.
    pub fn copy_from(&mut self, src: &RawFrame) -> bool {
        self.data.clear();
        if !self.ensure_capacity(src.data.len()) {
            return false;
        }
        self.data.extend_from_slice(&src.data);
        self.format = src.format;
        self.width = src.width;
        self.height = src.height;
        self.step = src.step;
        self.sequence = src.sequence;
        self.timestamp = src.timestamp;
        true
    }

    /// Minimum valid payload size for this frame's header.
    pub fn min_bytes(&self) -> usize {
        self.format.min_frame_bytes(self.width, self.height)
    }

    /// Header and payload validity check used at the ingest boundary.
    pub fn is_valid(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return false;
        }
        let min = self.min_bytes();
        min > 0 && self.data.len() >= min
    }
}
