// SPDX-License-Identifier: GPL-3.0-only

//! Negotiation behavior through the session API
//!
//! Complements the unit tests in `negotiation.rs` by checking what a host
//! observes via `set_preview_size` on devices with awkward descriptor
//! tables.

use std::sync::{Arc, Mutex};
use uvc_preview::{
    CameraSession, DescriptorSubtype, FormatDescriptor, FrameDescriptor, FrameFormat, FrameSink,
    FrameType, SessionState, StreamCtrl, StreamRequest, StreamTransport, TransportError,
};

struct ScriptedDevice {
    descriptors: Vec<FormatDescriptor>,
    accepts: Vec<FrameFormat>,
    attempts: Mutex<Vec<FrameFormat>>,
}

impl ScriptedDevice {
    fn new(descriptors: Vec<FormatDescriptor>, accepts: Vec<FrameFormat>) -> Arc<Self> {
        Arc::new(Self {
            descriptors,
            accepts,
            attempts: Mutex::new(Vec::new()),
        })
    }
}

impl StreamTransport for ScriptedDevice {
    fn negotiate(
        &self,
        format: FrameFormat,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<StreamCtrl, TransportError> {
        self.attempts.lock().unwrap().push(format);
        if self.accepts.contains(&format) {
            Ok(StreamCtrl {
                format,
                width,
                height,
                fps,
                format_index: 1,
                frame_index: 1,
            })
        } else {
            Err(TransportError::FormatNotSupported(format.name().into()))
        }
    }

    fn format_descriptors(&self) -> Vec<FormatDescriptor> {
        self.descriptors.clone()
    }

    fn frame_descriptor(&self, ctrl: &StreamCtrl) -> Result<FrameDescriptor, TransportError> {
        Ok(FrameDescriptor {
            width: ctrl.width,
            height: ctrl.height,
            subtype: DescriptorSubtype::Uncompressed,
        })
    }

    fn start_streaming(&self, _ctrl: &StreamCtrl, _sink: FrameSink) -> Result<(), TransportError> {
        Ok(())
    }

    fn stop_streaming(&self) {}
}

fn uncompressed_descriptor(fourcc: &[u8; 4]) -> FormatDescriptor {
    let mut guid = [0u8; 16];
    guid[..4].copy_from_slice(fourcc);
    FormatDescriptor {
        subtype: DescriptorSubtype::Uncompressed,
        guid,
    }
}

fn uncompressed_request(width: u32, height: u32) -> StreamRequest {
    StreamRequest {
        width,
        height,
        fps: 30,
        frame_type: FrameType::Uncompressed,
    }
}

#[test]
fn nv12_only_device_negotiates_without_fallback() {
    let device = ScriptedDevice::new(
        vec![uncompressed_descriptor(b"NV12")],
        vec![FrameFormat::Nv12],
    );
    let mut session = CameraSession::new(device.clone());

    session
        .set_preview_size(uncompressed_request(1920, 1080))
        .expect("negotiate");

    assert_eq!(session.state(), SessionState::Configured);
    assert_eq!(
        session.negotiated().expect("negotiated").format,
        FrameFormat::Nv12
    );
    // one attempt: the GUID scan picked NV12 up front, no fallback loop
    assert_eq!(*device.attempts.lock().unwrap(), vec![FrameFormat::Nv12]);
}

#[test]
fn uncompressed_refusal_walks_fallback_ladder() {
    // no NV12/I420 GUIDs advertised; the device only takes NV21
    let device = ScriptedDevice::new(vec![], vec![FrameFormat::Nv21]);
    let mut session = CameraSession::new(device.clone());

    session
        .set_preview_size(uncompressed_request(1280, 720))
        .expect("negotiate");

    assert_eq!(
        session.negotiated().expect("negotiated").format,
        FrameFormat::Nv21
    );
    assert_eq!(
        *device.attempts.lock().unwrap(),
        vec![
            FrameFormat::Uncompressed,
            FrameFormat::Nv12,
            FrameFormat::Nv21,
        ]
    );
}

#[test]
fn refused_negotiation_leaves_session_untouched() {
    let device = ScriptedDevice::new(vec![], vec![]);
    let mut session = CameraSession::new(device);

    let before = *session.request();
    session
        .set_preview_size(uncompressed_request(1280, 720))
        .expect_err("device refuses everything");

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.negotiated().is_none());
    assert_eq!(*session.request(), before);
}

#[test]
fn repeated_configuration_is_stable() {
    let device = ScriptedDevice::new(
        vec![uncompressed_descriptor(b"I420")],
        vec![FrameFormat::Nv12],
    );
    let mut session = CameraSession::new(device);

    session
        .set_preview_size(uncompressed_request(640, 480))
        .expect("negotiate");
    let first = session.negotiated().expect("negotiated").clone();
    session
        .set_preview_size(uncompressed_request(640, 480))
        .expect("negotiate");
    let second = session.negotiated().expect("negotiated").clone();
    assert_eq!(first, second);
}
