// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants
//!
//! Pipeline depths and the default stream request. The queue and pool sizes
//! bound the number of frame buffers alive at any moment: the preview queue
//! holds at most [`MAX_FRAME`] frames and the recycler keeps at most
//! [`FRAME_POOL_SZ`] spares.

/// Capacity of the preview queue (incoming frames beyond this are dropped).
pub const MAX_FRAME: usize = 4;

/// Capacity of the frame pool; frames recycled beyond this are freed.
pub const FRAME_POOL_SZ: usize = MAX_FRAME + 2;

/// Bytes per pixel of the display format (RGBA_8888 / RGBX_8888).
pub const PREVIEW_PIXEL_BYTES: usize = 4;

/// Default preview width in pixels.
pub const DEFAULT_PREVIEW_WIDTH: u32 = 640;

/// Default preview height in pixels.
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 480;

/// Default preview frame rate in frames per second.
pub const DEFAULT_PREVIEW_FPS: u32 = 30;
