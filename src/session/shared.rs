// SPDX-License-Identifier: GPL-3.0-only

//! Shared state between the session controller and its workers
//!
//! Three mutexes cover the whole engine, mirroring the three pipeline
//! stages: the pool has its own lock inside [`FramePool`], the preview
//! stage guards the FIFO queue plus the preview surface binding, and the
//! capture stage guards the latest-wins slot plus everything the capture
//! worker reconfigures at runtime (surface, callback, `capturing` flag).
//! `running` is a bare atomic so the transport callback can bail without
//! taking any lock.
//!
//! Surface and callback handles are cloned out of the stage locks before
//! any blocking call (surface post, host callback); no engine lock is ever
//! held across those.

use crate::constants::{FRAME_POOL_SZ, MAX_FRAME};
use crate::convert::CallbackConfig;
use crate::frame::{CallbackFormat, RawFrame};
use crate::pool::FramePool;
use crate::surface::Surface;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Host consumer of delivered frames.
///
/// `data` is borrowed for the duration of the call only; the host must
/// copy anything it wants to keep.
pub trait FrameCallback: Send {
    /// Called once per delivered frame with the payload in the configured
    /// callback pixel format.
    fn on_frame(&mut self, data: &[u8]);
}

/// Callback handle as stored in the capture stage.
pub(crate) type SharedCallback = Arc<Mutex<Box<dyn FrameCallback>>>;

/// State guarded by the preview mutex.
pub(crate) struct PreviewStage {
    /// FIFO of frames waiting for the preview worker.
    pub queue: VecDeque<RawFrame>,
    /// Bound preview surface, if any.
    pub surface: Option<Arc<dyn Surface>>,
}

/// State guarded by the capture mutex.
pub(crate) struct CaptureStage {
    /// Latest-wins slot feeding the capture worker.
    pub slot: Option<RawFrame>,
    /// Bound capture surface, if any.
    pub surface: Option<Arc<dyn Surface>>,
    /// Registered host callback, if any.
    pub callback: Option<SharedCallback>,
    /// Resolved converter and payload size for the callback format.
    pub callback_config: CallbackConfig,
    /// Controller intent: false asks the capture worker to park.
    pub capturing: bool,
    /// Worker acknowledgment: true while parked waiting for `capturing`.
    pub idle: bool,
}

/// Everything the controller, the workers, and the ingest callback share.
pub(crate) struct Shared {
    pub running: AtomicBool,
    pub pool: FramePool,
    /// Negotiated frame geometry, published by `start` for lock-free reads.
    pub frame_width: AtomicU32,
    pub frame_height: AtomicU32,
    preview: Mutex<PreviewStage>,
    pub preview_sync: Condvar,
    capture: Mutex<CaptureStage>,
    pub capture_sync: Condvar,
}

impl Shared {
    pub fn new(default_width: u32, default_height: u32) -> Self {
        Self {
            running: AtomicBool::new(false),
            pool: FramePool::new(FRAME_POOL_SZ),
            frame_width: AtomicU32::new(default_width),
            frame_height: AtomicU32::new(default_height),
            preview: Mutex::new(PreviewStage {
                queue: VecDeque::with_capacity(MAX_FRAME),
                surface: None,
            }),
            preview_sync: Condvar::new(),
            capture: Mutex::new(CaptureStage {
                slot: None,
                surface: None,
                callback: None,
                callback_config: CallbackConfig::resolve(CallbackFormat::Yuv, 0, 0),
                capturing: true,
                idle: false,
            }),
            capture_sync: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (
            self.frame_width.load(Ordering::SeqCst),
            self.frame_height.load(Ordering::SeqCst),
        )
    }

    pub fn lock_preview(&self) -> MutexGuard<'_, PreviewStage> {
        self.preview.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_capture(&self) -> MutexGuard<'_, CaptureStage> {
        self.capture.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait_preview<'a>(
        &self,
        guard: MutexGuard<'a, PreviewStage>,
    ) -> MutexGuard<'a, PreviewStage> {
        self.preview_sync
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait_capture<'a>(
        &self,
        guard: MutexGuard<'a, CaptureStage>,
    ) -> MutexGuard<'a, CaptureStage> {
        self.capture_sync
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Preview queue =====

    /// Enqueue a frame for the preview worker.
    ///
    /// Returns false (after recycling the frame) when the session is not
    /// running or the queue is full; incoming frames are the ones dropped.
    pub fn add_preview_frame(&self, frame: RawFrame) -> bool {
        let rejected = {
            let mut stage = self.lock_preview();
            if self.is_running() && stage.queue.len() < MAX_FRAME {
                stage.queue.push_back(frame);
                self.preview_sync.notify_one();
                None
            } else {
                Some(frame)
            }
        };
        match rejected {
            Some(frame) => {
                self.pool.release(frame);
                false
            }
            None => true,
        }
    }

    /// Block until a frame is queued or the session leaves Running.
    pub fn wait_preview_frame(&self) -> Option<RawFrame> {
        let mut stage = self.lock_preview();
        while self.is_running() && stage.queue.is_empty() {
            stage = self.wait_preview(stage);
        }
        if self.is_running() {
            stage.queue.pop_front()
        } else {
            None
        }
    }

    /// Recycle everything queued for preview.
    pub fn clear_preview_frames(&self) {
        let drained: Vec<RawFrame> = {
            let mut stage = self.lock_preview();
            stage.queue.drain(..).collect()
        };
        for frame in drained {
            self.pool.release(frame);
        }
    }

    pub fn preview_queue_len(&self) -> usize {
        self.lock_preview().queue.len()
    }

    // ===== Capture slot =====

    /// Put a frame into the latest-wins slot, recycling any occupant.
    ///
    /// Returns false (after recycling the frame) when the session is not
    /// running.
    pub fn add_capture_frame(&self, frame: RawFrame) -> bool {
        let (accepted, displaced) = {
            let mut stage = self.lock_capture();
            if self.is_running() {
                let displaced = stage.slot.replace(frame);
                self.capture_sync.notify_all();
                (true, displaced)
            } else {
                (false, Some(frame))
            }
        };
        if let Some(frame) = displaced {
            self.pool.release(frame);
        }
        accepted
    }

    /// Block until the slot holds a frame, the worker is asked to park, or
    /// the session leaves Running.
    pub fn wait_capture_frame(&self) -> Option<RawFrame> {
        let mut stage = self.lock_capture();
        while self.is_running() && stage.capturing && stage.slot.is_none() {
            stage = self.wait_capture(stage);
        }
        if self.is_running() && stage.capturing {
            stage.slot.take()
        } else {
            None
        }
    }

    /// Recycle the slot occupant, if any.
    pub fn clear_capture_frame(&self) {
        let displaced = self.lock_capture().slot.take();
        if let Some(frame) = displaced {
            self.pool.release(frame);
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.lock_capture().capturing
    }

    /// Recompute the callback converter for the current frame geometry,
    /// falling back to the given size while negotiation has not resolved
    /// one yet.
    pub fn refresh_callback_config(&self, fallback: (u32, u32)) {
        let (mut width, mut height) = self.frame_size();
        if width == 0 || height == 0 {
            (width, height) = fallback;
        }
        let mut stage = self.lock_capture();
        let format = stage.callback_config.format;
        stage.callback_config = CallbackConfig::resolve(format, width, height);
    }

    /// Wake both workers so blocking waits observe a state change.
    pub fn notify_workers(&self) {
        // touch each mutex so a worker between check and wait still sees
        // the wakeup
        drop(self.lock_preview());
        self.preview_sync.notify_all();
        drop(self.lock_capture());
        self.capture_sync.notify_all();
    }
}
