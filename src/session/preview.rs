// SPDX-License-Identifier: GPL-3.0-only

//! Preview worker
//!
//! Owns the conversion half of the pipeline: it drains the preview queue,
//! converts every frame to display RGBX, posts the result to the preview
//! surface, and forwards a frame to the capture stage. The transport's
//! ingest callback also lives here since it feeds this worker's queue.

use super::capture;
use super::shared::Shared;
use crate::constants::PREVIEW_PIXEL_BYTES;
use crate::convert::convert_to_display;
use crate::frame::RawFrame;
use crate::surface::{copy_to_surface, WindowFormat};
use crate::transport::{FrameSink, StreamTransport};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Build the per-frame callback handed to the transport.
///
/// Runs on the transport's thread(s); the only blocking it does is the
/// brief pool and preview mutex acquisitions. The transport's buffer is
/// deep-copied and never retained past return.
pub(crate) fn ingest_sink(shared: Arc<Shared>) -> FrameSink {
    Arc::new(move |frame: &RawFrame| {
        if !shared.is_running() {
            return;
        }
        if !frame.is_valid() {
            debug!(
                format = frame.format.name(),
                width = frame.width,
                height = frame.height,
                bytes = frame.data_bytes(),
                "dropping invalid frame"
            );
            return;
        }
        let Some(mut copy) = shared.pool.acquire(frame.data_bytes()) else {
            warn!("unable to allocate duplicate frame");
            return;
        };
        if !copy.copy_from(frame) {
            shared.pool.release(copy);
            return;
        }
        shared.add_preview_frame(copy);
    })
}

/// Preview worker entry point.
///
/// Spawns the capture worker, loops until the session leaves Running, then
/// wakes and joins the capture worker before stopping the transport.
pub(crate) fn run(shared: Arc<Shared>, transport: Arc<dyn StreamTransport>) {
    let capture_thread = thread::Builder::new().name("uvc-capture".into()).spawn({
        let shared = Arc::clone(&shared);
        move || capture::run(shared)
    });
    if let Err(ref err) = capture_thread {
        warn!(error = %err, "could not spawn capture worker");
    }

    shared.clear_preview_frames();
    debug!("streaming");

    let mut logged_input_format = false;
    while shared.is_running() {
        let Some(frame_in) = shared.wait_preview_frame() else {
            continue;
        };
        if !logged_input_format {
            info!(
                format = frame_in.format.name(),
                width = frame_in.width,
                height = frame_in.height,
                bytes = frame_in.data_bytes(),
                step = frame_in.step,
                "first preview frame"
            );
            logged_input_format = true;
        }
        process_frame(&shared, frame_in);
    }

    shared.capture_sync.notify_all();
    if let Ok(handle) = capture_thread {
        if handle.join().is_err() {
            warn!("capture worker panicked");
        }
    }
    transport.stop_streaming();
    debug!("streaming finished");
}

/// One iteration of the preview loop.
fn process_frame(shared: &Shared, frame_in: RawFrame) {
    // frames can shrink between ingest and here only through bugs in the
    // transport; re-check before the converters index into the payload
    let min_bytes = frame_in.min_bytes();
    if min_bytes == 0 || frame_in.data_bytes() < min_bytes {
        debug!(
            format = frame_in.format.name(),
            bytes = frame_in.data_bytes(),
            need = min_bytes,
            "skipping bad preview frame"
        );
        shared.pool.release(frame_in);
        return;
    }

    let preview_bytes =
        frame_in.width as usize * frame_in.height as usize * PREVIEW_PIXEL_BYTES;
    let Some(mut frame_out) = shared.pool.acquire(preview_bytes) else {
        shared.pool.release(frame_in);
        return;
    };

    if let Err(err) = convert_to_display(&frame_in, &mut frame_out) {
        debug!(error = %err, format = frame_in.format.name(), "display conversion failed");
        shared.pool.release(frame_out);
        shared.pool.release(frame_in);
        return;
    }

    draw_preview(shared, &frame_out);

    // When the host wants raw pixels in exactly the format the device
    // delivers and no capture surface is bound, fork an unconverted copy
    // to the capture stage instead of the RGBX rendition.
    let can_pass_raw = {
        let stage = shared.lock_capture();
        stage.callback.is_some()
            && stage.surface.is_none()
            && stage
                .callback_config
                .format
                .passthrough_matches(frame_in.format)
    };

    let mut callback_queued = false;
    if can_pass_raw {
        if let Some(mut raw_copy) = shared.pool.acquire(frame_in.data_bytes()) {
            if raw_copy.copy_from(&frame_in) {
                callback_queued = shared.add_capture_frame(raw_copy);
            } else {
                shared.pool.release(raw_copy);
            }
        }
    }

    if callback_queued {
        shared.pool.release(frame_out);
    } else {
        // add_capture_frame recycles internally when the session stopped
        shared.add_capture_frame(frame_out);
    }
    shared.pool.release(frame_in);
}

/// Post one display frame to the preview surface, if one is bound.
///
/// The surface handle is cloned out of the preview mutex first; the
/// blocking lock+post runs without any engine lock held.
fn draw_preview(shared: &Shared, frame: &RawFrame) {
    let surface = shared.lock_preview().surface.clone();
    let Some(surface) = surface else {
        return;
    };
    let geometry = surface.geometry();
    if geometry.width != frame.width || geometry.height != frame.height {
        surface.set_geometry(frame.width, frame.height, WindowFormat::Rgba8888);
    }
    if copy_to_surface(frame, surface.as_ref()).is_err() {
        debug!("preview surface lock refused, skipping frame");
    }
}
