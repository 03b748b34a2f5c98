// SPDX-License-Identifier: GPL-3.0-only

//! Render surface abstraction
//!
//! A [`Surface`] is an opaque window-system target with lockable pixel
//! memory and explicit post semantics. The engine binds up to two of them
//! (preview and capture) and writes display-format frames into their
//! buffers row by row, honoring the destination stride.
//!
//! Locking can block inside the windowing system, so the engine never holds
//! any of its own locks while calling [`Surface::with_buffer`].

use crate::constants::PREVIEW_PIXEL_BYTES;
use crate::errors::SurfaceError;
use crate::frame::RawFrame;

/// Pixel layout of a surface's backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFormat {
    /// 32-bit RGBA.
    Rgba8888,
    /// 32-bit RGB with a padding byte.
    Rgbx8888,
    /// 16-bit RGB565.
    Rgb565,
}

/// Geometry currently bound to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceGeometry {
    /// Buffer width in pixels.
    pub width: u32,
    /// Buffer height in pixels.
    pub height: u32,
    /// Buffer pixel layout.
    pub format: WindowFormat,
}

/// A locked surface buffer handed out for the duration of one write.
pub struct SurfaceBuffer<'a> {
    /// Writable pixel memory.
    pub bits: &'a mut [u8],
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    /// Row stride in pixels (not bytes); at least `width`.
    pub stride: u32,
}

/// Opaque render target with lock/post semantics.
pub trait Surface: Send + Sync {
    /// Bind buffer geometry. Subsequent locks hand out buffers of this
    /// size and layout.
    fn set_geometry(&self, width: u32, height: u32, format: WindowFormat);

    /// Geometry currently bound.
    fn geometry(&self) -> SurfaceGeometry;

    /// Native pixel layout of the surface.
    fn format(&self) -> WindowFormat;

    /// Lock the backing buffer, hand it to `write` exactly once, then
    /// unlock and post.
    ///
    /// Returns `Err` when the windowing system refuses the lock; `write`
    /// is not called in that case and nothing is posted.
    fn with_buffer(
        &self,
        write: &mut dyn FnMut(&mut SurfaceBuffer<'_>),
    ) -> Result<(), SurfaceError>;
}

/// Copy a display-format frame into `surface` row by row.
///
/// Rows are clipped to whichever of source and destination is narrower, so
/// a transient geometry mismatch shows a partial image instead of tearing
/// into neighboring rows.
pub(crate) fn copy_to_surface(frame: &RawFrame, surface: &dyn Surface) -> Result<(), SurfaceError> {
    surface.with_buffer(&mut |buffer| {
        let src_stride = frame.width as usize * PREVIEW_PIXEL_BYTES;
        let dst_stride = buffer.stride as usize * PREVIEW_PIXEL_BYTES;
        let row_bytes = (buffer.width as usize * PREVIEW_PIXEL_BYTES).min(src_stride);
        let rows = (buffer.height as usize).min(frame.height as usize);
        for row in 0..rows {
            let src_start = row * src_stride;
            let dst_start = row * dst_stride;
            let Some(src) = frame.data.get(src_start..src_start + row_bytes) else {
                break;
            };
            let Some(dst) = buffer.bits.get_mut(dst_start..dst_start + row_bytes) else {
                break;
            };
            dst.copy_from_slice(src);
        }
    })
}

/// Zero-fill the visible region of `surface` and post it.
pub(crate) fn clear_surface(surface: &dyn Surface) -> Result<(), SurfaceError> {
    surface.with_buffer(&mut |buffer| {
        let dst_stride = buffer.stride as usize * PREVIEW_PIXEL_BYTES;
        let row_bytes = buffer.width as usize * PREVIEW_PIXEL_BYTES;
        for row in 0..buffer.height as usize {
            let dst_start = row * dst_stride;
            if let Some(dst) = buffer.bits.get_mut(dst_start..dst_start + row_bytes) {
                dst.fill(0);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;
    use std::sync::Mutex;

    struct MemorySurface {
        state: Mutex<(SurfaceGeometry, Vec<u8>)>,
        stride: u32,
    }

    impl MemorySurface {
        fn new(width: u32, height: u32, stride: u32) -> Self {
            let geometry = SurfaceGeometry {
                width,
                height,
                format: WindowFormat::Rgba8888,
            };
            let bytes = stride as usize * height as usize * PREVIEW_PIXEL_BYTES;
            Self {
                state: Mutex::new((geometry, vec![0xAA; bytes])),
                stride,
            }
        }
    }

    impl Surface for MemorySurface {
        fn set_geometry(&self, width: u32, height: u32, format: WindowFormat) {
            let mut state = self.state.lock().unwrap();
            state.0 = SurfaceGeometry {
                width,
                height,
                format,
            };
            state.1 = vec![0xAA; self.stride as usize * height as usize * PREVIEW_PIXEL_BYTES];
        }

        fn geometry(&self) -> SurfaceGeometry {
            self.state.lock().unwrap().0
        }

        fn format(&self) -> WindowFormat {
            WindowFormat::Rgba8888
        }

        fn with_buffer(
            &self,
            write: &mut dyn FnMut(&mut SurfaceBuffer<'_>),
        ) -> Result<(), SurfaceError> {
            let mut state = self.state.lock().unwrap();
            let geometry = state.0;
            let mut buffer = SurfaceBuffer {
                bits: &mut state.1,
                width: geometry.width,
                height: geometry.height,
                stride: self.stride,
            };
            write(&mut buffer);
            Ok(())
        }
    }

    fn rgbx_frame(width: u32, height: u32, fill: u8) -> RawFrame {
        RawFrame {
            format: FrameFormat::Rgbx,
            width,
            height,
            step: width as usize * PREVIEW_PIXEL_BYTES,
            data: vec![fill; width as usize * height as usize * PREVIEW_PIXEL_BYTES],
            sequence: None,
            timestamp: None,
        }
    }

    #[test]
    fn blit_honors_destination_stride() {
        let surface = MemorySurface::new(2, 2, 4);
        let frame = rgbx_frame(2, 2, 0x11);
        copy_to_surface(&frame, &surface).expect("post");

        let state = surface.state.lock().unwrap();
        let row = 4 * PREVIEW_PIXEL_BYTES;
        // visible pixels written, stride padding untouched
        assert!(state.1[..2 * PREVIEW_PIXEL_BYTES].iter().all(|&b| b == 0x11));
        assert!(state.1[2 * PREVIEW_PIXEL_BYTES..row]
            .iter()
            .all(|&b| b == 0xAA));
        assert!(state.1[row..row + 2 * PREVIEW_PIXEL_BYTES]
            .iter()
            .all(|&b| b == 0x11));
    }

    #[test]
    fn blit_clips_wider_source() {
        let surface = MemorySurface::new(2, 2, 2);
        let frame = rgbx_frame(4, 2, 0x22);
        copy_to_surface(&frame, &surface).expect("post");
        let state = surface.state.lock().unwrap();
        assert!(state.1.iter().all(|&b| b == 0x22));
    }

    #[test]
    fn clear_zeroes_visible_region() {
        let surface = MemorySurface::new(3, 2, 3);
        clear_surface(&surface).expect("post");
        let state = surface.state.lock().unwrap();
        assert!(state.1.iter().all(|&b| b == 0));
    }
}
