// SPDX-License-Identifier: GPL-3.0-only

//! Stream request configuration

use crate::constants::{DEFAULT_PREVIEW_FPS, DEFAULT_PREVIEW_HEIGHT, DEFAULT_PREVIEW_WIDTH};
use crate::frame::FrameFormat;
use serde::{Deserialize, Serialize};

/// Descriptor family the host asks for when configuring the preview size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameType {
    /// Motion JPEG descriptors.
    Mjpeg,
    /// Uncompressed (raw YUV) descriptors.
    Uncompressed,
    /// Frame-based descriptors (H.264).
    FrameBased,
    /// No preference; negotiates plain YUYV.
    #[default]
    Default,
}

impl FrameType {
    /// Stream format the negotiator tries first for this frame type.
    pub fn preferred_format(self) -> FrameFormat {
        match self {
            FrameType::Mjpeg => FrameFormat::Mjpeg,
            FrameType::Uncompressed => FrameFormat::Uncompressed,
            FrameType::FrameBased => FrameFormat::H264,
            FrameType::Default => FrameFormat::Yuyv,
        }
    }
}

/// Requested stream configuration (the host's ask, before negotiation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Requested width in pixels.
    pub width: u32,
    /// Requested height in pixels.
    pub height: u32,
    /// Requested frame rate in frames per second.
    pub fps: u32,
    /// Requested descriptor family.
    pub frame_type: FrameType,
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            width: DEFAULT_PREVIEW_WIDTH,
            height: DEFAULT_PREVIEW_HEIGHT,
            fps: DEFAULT_PREVIEW_FPS,
            frame_type: FrameType::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request() {
        let request = StreamRequest::default();
        assert_eq!(request.width, 640);
        assert_eq!(request.height, 480);
        assert_eq!(request.fps, 30);
        assert_eq!(request.frame_type, FrameType::Default);
    }

    #[test]
    fn preferred_format_mapping() {
        assert_eq!(FrameType::Mjpeg.preferred_format(), FrameFormat::Mjpeg);
        assert_eq!(
            FrameType::Uncompressed.preferred_format(),
            FrameFormat::Uncompressed
        );
        assert_eq!(FrameType::FrameBased.preferred_format(), FrameFormat::H264);
        assert_eq!(FrameType::Default.preferred_format(), FrameFormat::Yuyv);
    }
}
