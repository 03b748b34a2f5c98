// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion
//!
//! Two directions, matching the two consumer stages: [`display`] turns
//! whatever the device delivers into 32-bit RGBX for the preview surface,
//! and [`callback`] turns RGBX into whichever layout the host registered
//! for its frame callback. Converter selection for the callback side is
//! resolved once per configuration change into a [`CallbackConfig`] so the
//! per-frame path is a single function-pointer call.

pub mod callback;
pub mod display;

use crate::errors::{ConvertError, ConvertResult};
use crate::frame::{CallbackFormat, FrameFormat, RawFrame};

/// Conversion function from one frame into another.
pub type ConvertFn = fn(&RawFrame, &mut RawFrame) -> ConvertResult<()>;

/// Convert a device frame to display RGBX, dispatching on its format.
///
/// Formats the engine does not recognize take the YUYV path as a best
/// effort; a hopeless payload fails validation there and the frame drops.
pub fn convert_to_display(src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
    match src.format {
        FrameFormat::Mjpeg => display::mjpeg_to_rgbx(src, dst),
        FrameFormat::Yuyv => display::yuyv_to_rgbx(src, dst),
        FrameFormat::Nv12 => display::nv12_to_rgbx(src, dst),
        FrameFormat::Nv21 => display::nv21_to_rgbx(src, dst),
        FrameFormat::I420 => display::i420_to_rgbx(src, dst),
        _ => display::yuyv_to_rgbx(src, dst),
    }
}

/// Resolved callback delivery parameters.
///
/// Recomputed whenever the host changes the callback pixel format or the
/// negotiated frame size changes; read-only on the per-frame path.
#[derive(Debug, Clone, Copy)]
pub struct CallbackConfig {
    /// Host-facing pixel format.
    pub format: CallbackFormat,
    /// Converter from display RGBX, `None` for the RGBX identity.
    pub converter: Option<ConvertFn>,
    /// Expected callback payload size for the configured frame geometry.
    pub bytes_per_frame: usize,
}

impl CallbackConfig {
    /// Resolve the converter and payload size for `format` at the given
    /// frame geometry.
    pub fn resolve(format: CallbackFormat, width: u32, height: u32) -> Self {
        let converter: Option<ConvertFn> = match format {
            CallbackFormat::Raw | CallbackFormat::Yuv => Some(callback::rgbx_to_yuyv),
            CallbackFormat::Nv12 => Some(callback::rgbx_to_nv12),
            CallbackFormat::Nv21 => Some(callback::rgbx_to_nv21),
            CallbackFormat::I420 => Some(callback::rgbx_to_i420),
            CallbackFormat::Rgb => Some(callback::rgbx_to_rgb),
            CallbackFormat::Rgb565 => Some(callback::rgbx_to_rgb565),
            CallbackFormat::Bgr => Some(callback::rgbx_to_bgr),
            CallbackFormat::Rgbx => None,
        };
        Self {
            format,
            converter,
            bytes_per_frame: format.frame_bytes(width, height),
        }
    }

    /// Run the configured converter.
    pub fn convert(&self, src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
        match self.converter {
            Some(f) => f(src, dst),
            None => Err(ConvertError::Unsupported(src.format)),
        }
    }
}
