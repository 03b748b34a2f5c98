// SPDX-License-Identifier: GPL-3.0-only

//! Reusable frame buffer pool
//!
//! Amortizes allocation across the pipeline: every stage that needs a frame
//! buffer asks the pool first and hands the buffer back when done. The pool
//! keeps at most its configured capacity of spares (LIFO, so the most
//! recently touched buffer is reused first) and frees anything beyond that.

use crate::frame::RawFrame;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Bounded LIFO recycler of [`RawFrame`] buffers.
///
/// All access is serialized under one internal mutex. `acquire` never
/// blocks beyond that mutex and never waits for a buffer to come back.
pub struct FramePool {
    frames: Mutex<Vec<RawFrame>>,
    capacity: usize,
}

impl FramePool {
    /// Create an empty pool keeping at most `capacity` spare buffers.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RawFrame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a buffer with capacity of at least `min_bytes`.
    ///
    /// Reuses a pooled buffer when one is available, otherwise allocates a
    /// fresh one. Returns `None` only when allocation fails; the caller is
    /// expected to drop the frame it wanted to process.
    pub fn acquire(&self, min_bytes: usize) -> Option<RawFrame> {
        let reused = self.lock().pop();
        match reused {
            Some(mut frame) => {
                if !frame.ensure_capacity(min_bytes) {
                    return None;
                }
                frame.data.clear();
                Some(frame)
            }
            None => {
                debug!(bytes = min_bytes, "allocating new frame");
                RawFrame::with_capacity(min_bytes)
            }
        }
    }

    /// Return a buffer to the pool, or free it when the pool is full.
    pub fn release(&self, frame: RawFrame) {
        let mut frames = self.lock();
        if frames.len() < self.capacity {
            frames.push(frame);
        }
        // otherwise the frame drops here
    }

    /// Fill the pool with `n` buffers of `bytes_each` capacity.
    ///
    /// Used on session start so steady-state streaming does not allocate.
    /// Allocation failures stop the prefill early; streaming still works,
    /// it just allocates lazily.
    pub fn prefill(&self, n: usize, bytes_each: usize) {
        self.drain();
        let mut frames = self.lock();
        for _ in 0..n.min(self.capacity) {
            match RawFrame::with_capacity(bytes_each) {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
    }

    /// Free every pooled buffer.
    pub fn drain(&self) {
        self.lock().clear();
    }

    /// Number of spare buffers currently pooled.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no spare buffers are pooled.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
