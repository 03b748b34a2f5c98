// SPDX-License-Identifier: GPL-3.0-only

//! Capture worker
//!
//! Consumes the latest-wins slot: optionally blits the frame to the
//! capture surface, then hands it to the host callback, converting to the
//! configured callback format when the raw passthrough path did not apply.
//!
//! Reconfiguration while streaming uses a park/resume handshake driven by
//! the `capturing` flag: the controller clears it and waits; the worker
//! finishes its iteration, parks with `idle = true` and a broadcast, and
//! resumes only once the controller sets `capturing` again.

use super::shared::Shared;
use crate::frame::RawFrame;
use crate::surface::copy_to_surface;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use tracing::{debug, info, warn};

/// Capture worker entry point; runs until the session leaves Running.
pub(crate) fn run(shared: Arc<Shared>) {
    shared.clear_capture_frame();

    let mut logged_callback_path = false;
    while shared.is_running() {
        while shared.is_running() && shared.is_capturing() {
            let Some(frame) = shared.wait_capture_frame() else {
                continue;
            };
            let surface = shared.lock_capture().surface.clone();
            if let Some(surface) = surface {
                if copy_to_surface(&frame, surface.as_ref()).is_err() {
                    debug!("capture surface lock refused, skipping frame");
                }
            }
            dispatch_callback(&shared, frame, &mut logged_callback_path);
        }
        park(&shared);
    }
    debug!("capture worker exiting");
}

/// Park until the controller re-enables capturing or the session stops.
fn park(shared: &Shared) {
    let mut stage = shared.lock_capture();
    stage.idle = true;
    shared.capture_sync.notify_all();
    while shared.is_running() && !stage.capturing {
        stage = shared.wait_capture(stage);
    }
    stage.idle = false;
}

/// Deliver one frame to the host callback, converting when needed.
///
/// Whatever happens, exactly one buffer ends up back in the pool: the
/// input frame, or the conversion output that replaced it.
fn dispatch_callback(shared: &Shared, frame: RawFrame, logged_path: &mut bool) {
    let (callback, config) = {
        let stage = shared.lock_capture();
        (stage.callback.clone(), stage.callback_config)
    };
    let Some(callback) = callback else {
        shared.pool.release(frame);
        return;
    };

    let passthrough = config.format.passthrough_matches(frame.format);
    let delivered = if !passthrough && config.converter.is_some() {
        let expected = config.format.frame_bytes(frame.width, frame.height);
        let out_bytes = if expected > 0 {
            expected
        } else {
            config.bytes_per_frame
        };
        let Some(mut out) = shared.pool.acquire(out_bytes) else {
            warn!("failed to allocate callback frame");
            shared.pool.release(frame);
            return;
        };
        match config.convert(&frame, &mut out) {
            Ok(()) => {
                shared.pool.release(frame);
                out
            }
            Err(err) => {
                warn!(error = %err, "failed to convert callback frame");
                shared.pool.release(out);
                shared.pool.release(frame);
                return;
            }
        }
    } else {
        frame
    };

    if !*logged_path {
        info!(
            format = delivered.format.name(),
            passthrough,
            callback_format = config.format.raw(),
            bytes = delivered.data_bytes(),
            width = delivered.width,
            height = delivered.height,
            "first callback dispatch"
        );
        *logged_path = true;
    }

    {
        let mut host = callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let payload = delivered.data.as_slice();
        if catch_unwind(AssertUnwindSafe(|| host.on_frame(payload))).is_err() {
            warn!("frame callback panicked, continuing");
        }
    }
    shared.pool.release(delivered);
}
