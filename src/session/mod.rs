// SPDX-License-Identifier: GPL-3.0-only

//! Camera preview session
//!
//! [`CameraSession`] owns the whole streaming lifecycle: it negotiates a
//! format, binds surfaces, spawns the preview and capture workers, and
//! tears everything down again. One session drives one device.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──set_preview_size──▶ Configured ──start──▶ Running
//!   ▲                                                 │
//!   └────────────────────── stop ◀────────────────────┘
//! ```
//!
//! Surfaces and the frame callback may be swapped in any state; while
//! Running, the capture worker is parked first so the swap never races a
//! frame delivery.

mod capture;
mod preview;
mod shared;

pub use shared::FrameCallback;

use crate::config::{FrameType, StreamRequest};
use crate::constants::FRAME_POOL_SZ;
use crate::convert::CallbackConfig;
use crate::errors::{SessionError, SessionResult, TransportError};
use crate::frame::CallbackFormat;
use crate::negotiation::{negotiate_stream, NegotiatedStream};
use crate::surface::{clear_surface, Surface, WindowFormat};
use crate::transport::{DescriptorSubtype, StreamTransport};
use shared::{CaptureStage, Shared, SharedCallback};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream configured.
    Idle,
    /// A stream control has been negotiated but nothing runs yet.
    Configured,
    /// Workers are streaming.
    Running,
    /// `stop` is tearing the workers down.
    Stopping,
}

/// Controller for one camera preview session.
pub struct CameraSession {
    transport: Arc<dyn StreamTransport>,
    shared: Arc<Shared>,
    request: StreamRequest,
    negotiated: Option<NegotiatedStream>,
    preview_format: WindowFormat,
    state: SessionState,
    preview_thread: Option<JoinHandle<()>>,
}

impl CameraSession {
    /// Create a session over `transport` with the default stream request.
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        let request = StreamRequest::default();
        Self {
            transport,
            shared: Arc::new(Shared::new(request.width, request.height)),
            request,
            negotiated: None,
            preview_format: WindowFormat::Rgba8888,
            state: SessionState::Idle,
            preview_thread: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The stream request currently configured.
    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// The negotiated stream, once `set_preview_size` or `start` succeeded.
    pub fn negotiated(&self) -> Option<&NegotiatedStream> {
        self.negotiated.as_ref()
    }

    /// Number of spare buffers currently pooled (diagnostics).
    pub fn pooled_frames(&self) -> usize {
        self.shared.pool.len()
    }

    /// Number of frames waiting in the preview queue (diagnostics).
    pub fn queued_preview_frames(&self) -> usize {
        self.shared.preview_queue_len()
    }

    /// Negotiate a stream for the given request and remember the outcome.
    ///
    /// Allowed in `Idle` and `Configured` only; a running session has to be
    /// stopped first. On failure nothing about the session changes.
    pub fn set_preview_size(&mut self, request: StreamRequest) -> SessionResult<()> {
        match self.state {
            SessionState::Idle | SessionState::Configured => {}
            state => return Err(SessionError::InvalidState(state)),
        }
        let negotiated = negotiate_stream(self.transport.as_ref(), &request)
            .map_err(SessionError::Negotiation)?;
        info!(
            format = negotiated.format.name(),
            width = request.width,
            height = request.height,
            fps = request.fps,
            "preview size configured"
        );
        self.request = request;
        self.negotiated = Some(negotiated);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Bind, replace, or clear the preview surface. Allowed in any state.
    pub fn set_preview_surface(&mut self, surface: Option<Arc<dyn Surface>>) {
        let previous = {
            let mut stage = self.shared.lock_preview();
            std::mem::replace(&mut stage.surface, surface.clone())
        };
        drop(previous);
        if let Some(surface) = surface {
            let (width, height) = self.shared.frame_size();
            surface.set_geometry(width, height, self.preview_format);
        }
    }

    /// Bind, replace, or clear the capture surface.
    ///
    /// While Running the capture worker is parked for the swap. A surface
    /// whose native format cannot take the configured display format is
    /// rejected and the previous binding stays.
    pub fn set_capture_surface(&mut self, surface: Option<Arc<dyn Surface>>) {
        if let Some(ref candidate) = surface {
            if self.preview_format == WindowFormat::Rgb565
                && candidate.format() != WindowFormat::Rgb565
            {
                warn!("capture surface format mismatch, keeping previous binding");
                return;
            }
        }
        self.with_quiesced_capture(move |stage| {
            stage.surface = surface;
        });
    }

    /// Register or clear the host frame callback and its pixel format.
    ///
    /// While Running the capture worker is parked for the swap; the next
    /// delivered frame already uses the new configuration.
    pub fn set_frame_callback(
        &mut self,
        callback: Option<Box<dyn FrameCallback>>,
        format: CallbackFormat,
    ) {
        let handle: Option<SharedCallback> = callback.map(|cb| Arc::new(Mutex::new(cb)));
        let (mut width, mut height) = self.shared.frame_size();
        if width == 0 || height == 0 {
            (width, height) = (self.request.width, self.request.height);
        }
        let config = CallbackConfig::resolve(format, width, height);
        info!(
            callback_format = format.raw(),
            bytes = config.bytes_per_frame,
            registered = handle.is_some(),
            "frame callback configured"
        );
        self.with_quiesced_capture(move |stage| {
            stage.callback = handle;
            stage.callback_config = config;
        });
    }

    /// Start streaming.
    ///
    /// Negotiates (re-using a stored format when `set_preview_size` ran),
    /// resolves the exact frame geometry, prefills the pool, opens the
    /// stream and spawns the workers. Fails without a bound preview
    /// surface, and surfaces negotiation/transport errors directly.
    pub fn start(&mut self) -> SessionResult<()> {
        match self.state {
            SessionState::Idle | SessionState::Configured => {}
            state => return Err(SessionError::InvalidState(state)),
        }
        if self.shared.lock_preview().surface.is_none() {
            return Err(SessionError::NoPreviewSurface);
        }

        let negotiated = match &self.negotiated {
            Some(stored) => {
                let ctrl = self
                    .transport
                    .negotiate(
                        stored.format,
                        self.request.width,
                        self.request.height,
                        self.request.fps,
                    )
                    .map_err(SessionError::Negotiation)?;
                NegotiatedStream {
                    ctrl,
                    format: stored.format,
                }
            }
            None => negotiate_stream(self.transport.as_ref(), &self.request)
                .map_err(SessionError::Negotiation)?,
        };

        let (frame_width, frame_height, subtype) =
            match self.transport.frame_descriptor(&negotiated.ctrl) {
                Ok(desc) => (desc.width, desc.height, desc.subtype),
                Err(err) => {
                    warn!(error = %err, "could not resolve frame descriptor, using requested size");
                    (
                        self.request.width,
                        self.request.height,
                        fallback_subtype(self.request.frame_type),
                    )
                }
            };
        self.shared.frame_width.store(frame_width, Ordering::SeqCst);
        self.shared
            .frame_height
            .store(frame_height, Ordering::SeqCst);
        info!(
            width = frame_width,
            height = frame_height,
            format = negotiated.format.name(),
            subtype = ?subtype,
            "prepared preview stream"
        );

        let surface = self.shared.lock_preview().surface.clone();
        if let Some(surface) = surface {
            surface.set_geometry(frame_width, frame_height, self.preview_format);
        }

        let bytes_per_pixel = if subtype == DescriptorSubtype::Mjpeg { 4 } else { 2 };
        let frame_bytes = frame_width as usize * frame_height as usize * bytes_per_pixel;
        self.shared.pool.prefill(FRAME_POOL_SZ, frame_bytes);
        self.shared
            .refresh_callback_config((self.request.width, self.request.height));
        {
            let mut stage = self.shared.lock_capture();
            stage.capturing = true;
            stage.idle = false;
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let sink = preview::ingest_sink(Arc::clone(&self.shared));
        if let Err(err) = self.transport.start_streaming(&negotiated.ctrl, sink) {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(SessionError::Stream(err));
        }

        let worker = thread::Builder::new().name("uvc-preview".into()).spawn({
            let shared = Arc::clone(&self.shared);
            let transport = Arc::clone(&self.transport);
            move || preview::run(shared, transport)
        });
        match worker {
            Ok(handle) => self.preview_thread = Some(handle),
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.transport.stop_streaming();
                return Err(SessionError::Stream(TransportError::Other(err.to_string())));
            }
        }

        self.negotiated = Some(negotiated);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Stop streaming, join both workers and clear every stage.
    ///
    /// Idempotent; calling it on an already-idle session is a no-op.
    pub fn stop(&mut self) {
        if self.state == SessionState::Running {
            self.state = SessionState::Stopping;
            info!("stopping preview session");
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.notify_workers();
            if let Some(handle) = self.preview_thread.take() {
                if handle.join().is_err() {
                    warn!("preview worker panicked");
                }
            }
            self.clear_display();
        }
        self.shared.clear_preview_frames();
        self.shared.clear_capture_frame();
        self.shared.lock_preview().surface = None;
        self.shared.lock_capture().surface = None;
        self.state = SessionState::Idle;
    }

    /// Zero-fill both bound surfaces so the last frame does not linger.
    fn clear_display(&self) {
        let capture_surface = self.shared.lock_capture().surface.clone();
        if let Some(surface) = capture_surface {
            let _ = clear_surface(surface.as_ref());
        }
        let preview_surface = self.shared.lock_preview().surface.clone();
        if let Some(surface) = preview_surface {
            let _ = clear_surface(surface.as_ref());
        }
    }

    /// Park the capture worker, apply `apply` under the capture mutex,
    /// then let the worker resume with the new configuration.
    fn with_quiesced_capture<R>(&self, apply: impl FnOnce(&mut CaptureStage) -> R) -> R {
        let mut stage = self.shared.lock_capture();
        if self.shared.is_running() && stage.capturing {
            stage.capturing = false;
            self.shared.capture_sync.notify_all();
            while self.shared.is_running() && !stage.idle {
                stage = self.shared.wait_capture(stage);
            }
        }
        let result = apply(&mut stage);
        stage.capturing = true;
        self.shared.capture_sync.notify_all();
        result
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
        self.shared.pool.drain();
    }
}

/// Descriptor subtype assumed when the transport cannot resolve one.
fn fallback_subtype(frame_type: FrameType) -> DescriptorSubtype {
    match frame_type {
        FrameType::Mjpeg => DescriptorSubtype::Mjpeg,
        FrameType::FrameBased => DescriptorSubtype::FrameBased,
        FrameType::Uncompressed | FrameType::Default => DescriptorSubtype::Uncompressed,
    }
}
