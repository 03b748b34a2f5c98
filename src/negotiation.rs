// SPDX-License-Identifier: GPL-3.0-only

//! Stream format negotiation
//!
//! Turns the host's requested `(width, height, fps, frame type)` into a
//! stream control the device actually accepts. Two quirks of real hardware
//! drive the shape of this module: cameras that advertise their raw
//! streams under `NV12`/`I420` FourCC GUIDs rather than plain YUY2, and
//! cameras that refuse an uncompressed request outright but accept one of
//! the common YUV layouts when asked explicitly.

use crate::config::StreamRequest;
use crate::errors::TransportResult;
use crate::frame::FrameFormat;
use crate::transport::{DescriptorSubtype, StreamCtrl, StreamTransport};
use tracing::{debug, info};

/// Fallback ladder tried when an uncompressed request is refused.
const UNCOMPRESSED_FALLBACKS: [FrameFormat; 4] = [
    FrameFormat::Nv12,
    FrameFormat::Nv21,
    FrameFormat::Yuyv,
    FrameFormat::Mjpeg,
];

/// Result of a successful negotiation: the device's stream control plus
/// the raw format the engine will receive frames in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedStream {
    /// Accepted stream control.
    pub ctrl: StreamCtrl,
    /// Raw stream format the control fixes.
    pub format: FrameFormat,
}

/// Scan the device's uncompressed format descriptors for an `NV12` or
/// `I420` FourCC GUID.
///
/// I420 is negotiated as NV12; the per-frame format reported by the
/// transport decides which converter runs later. First match in
/// stream-interface order wins.
fn uncompressed_guid_override(transport: &dyn StreamTransport) -> Option<FrameFormat> {
    for descriptor in transport.format_descriptors() {
        if descriptor.subtype != DescriptorSubtype::Uncompressed {
            continue;
        }
        match &descriptor.fourcc() {
            b"NV12" => {
                debug!("device advertises NV12 uncompressed descriptor");
                return Some(FrameFormat::Nv12);
            }
            b"I420" => {
                debug!("device advertises I420 uncompressed descriptor");
                return Some(FrameFormat::Nv12);
            }
            _ => {}
        }
    }
    None
}

/// Negotiate a stream control for `request`.
///
/// On failure the transport's error is propagated unchanged and nothing
/// about the session is touched; the caller decides whether to retry.
pub fn negotiate_stream(
    transport: &dyn StreamTransport,
    request: &StreamRequest,
) -> TransportResult<NegotiatedStream> {
    let mut format = request.frame_type.preferred_format();

    if format == FrameFormat::Uncompressed {
        if let Some(raw) = uncompressed_guid_override(transport) {
            format = raw;
        }
    }

    info!(
        format = format.name(),
        width = request.width,
        height = request.height,
        fps = request.fps,
        "negotiating stream"
    );

    match transport.negotiate(format, request.width, request.height, request.fps) {
        Ok(ctrl) => Ok(NegotiatedStream { ctrl, format }),
        // The fallback ladder only applies when the attempt that failed was
        // the plain uncompressed request; a GUID-overridden NV12 attempt
        // fails for real.
        Err(mut last_err) if format == FrameFormat::Uncompressed => {
            for fallback in UNCOMPRESSED_FALLBACKS {
                match transport.negotiate(fallback, request.width, request.height, request.fps) {
                    Ok(ctrl) => {
                        info!(
                            format = fallback.name(),
                            "uncompressed request refused, fell back"
                        );
                        return Ok(NegotiatedStream {
                            ctrl,
                            format: fallback,
                        });
                    }
                    Err(err) => last_err = err,
                }
            }
            Err(last_err)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameType;
    use crate::errors::TransportError;
    use crate::transport::{FormatDescriptor, FrameDescriptor, FrameSink};
    use std::sync::Mutex;

    struct FakeDevice {
        descriptors: Vec<FormatDescriptor>,
        accepts: Vec<FrameFormat>,
        attempts: Mutex<Vec<FrameFormat>>,
    }

    impl FakeDevice {
        fn new(descriptors: Vec<FormatDescriptor>, accepts: Vec<FrameFormat>) -> Self {
            Self {
                descriptors,
                accepts,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<FrameFormat> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl StreamTransport for FakeDevice {
        fn negotiate(
            &self,
            format: FrameFormat,
            width: u32,
            height: u32,
            fps: u32,
        ) -> TransportResult<StreamCtrl> {
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

        fn frame_descriptor(&self, ctrl: &StreamCtrl) -> TransportResult<FrameDescriptor> {
            Ok(FrameDescriptor {
                width: ctrl.width,
                height: ctrl.height,
                subtype: DescriptorSubtype::Uncompressed,
            })
        }

        fn start_streaming(&self, _ctrl: &StreamCtrl, _sink: FrameSink) -> TransportResult<()> {
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

    fn request(frame_type: FrameType) -> StreamRequest {
        StreamRequest {
            width: 1920,
            height: 1080,
            fps: 30,
            frame_type,
        }
    }

    #[test]
    fn nv12_guid_overrides_uncompressed() {
        let device = FakeDevice::new(
            vec![uncompressed_descriptor(b"NV12")],
            vec![FrameFormat::Nv12],
        );
        let negotiated =
            negotiate_stream(&device, &request(FrameType::Uncompressed)).expect("negotiate");
        assert_eq!(negotiated.format, FrameFormat::Nv12);
        // single attempt, no fallback loop
        assert_eq!(device.attempts(), vec![FrameFormat::Nv12]);
    }

    #[test]
    fn i420_guid_negotiates_as_nv12() {
        let device = FakeDevice::new(
            vec![uncompressed_descriptor(b"I420")],
            vec![FrameFormat::Nv12],
        );
        let negotiated =
            negotiate_stream(&device, &request(FrameType::Uncompressed)).expect("negotiate");
        assert_eq!(negotiated.format, FrameFormat::Nv12);
    }

    #[test]
    fn first_guid_match_wins() {
        let device = FakeDevice::new(
            vec![
                uncompressed_descriptor(b"YUY2"),
                uncompressed_descriptor(b"I420"),
                uncompressed_descriptor(b"NV12"),
            ],
            vec![FrameFormat::Nv12],
        );
        negotiate_stream(&device, &request(FrameType::Uncompressed)).expect("negotiate");
        assert_eq!(device.attempts(), vec![FrameFormat::Nv12]);
    }

    #[test]
    fn fallback_ladder_order() {
        // no NV12/I420 GUIDs, device only speaks YUYV
        let device = FakeDevice::new(vec![], vec![FrameFormat::Yuyv]);
        let negotiated =
            negotiate_stream(&device, &request(FrameType::Uncompressed)).expect("negotiate");
        assert_eq!(negotiated.format, FrameFormat::Yuyv);
        assert_eq!(
            device.attempts(),
            vec![
                FrameFormat::Uncompressed,
                FrameFormat::Nv12,
                FrameFormat::Nv21,
                FrameFormat::Yuyv,
            ]
        );
    }

    #[test]
    fn no_fallback_for_mjpeg_request() {
        let device = FakeDevice::new(vec![], vec![FrameFormat::Yuyv]);
        let err = negotiate_stream(&device, &request(FrameType::Mjpeg)).expect_err("refused");
        assert!(matches!(err, TransportError::FormatNotSupported(_)));
        assert_eq!(device.attempts(), vec![FrameFormat::Mjpeg]);
    }

    #[test]
    fn all_fallbacks_refused_propagates_error() {
        let device = FakeDevice::new(vec![], vec![]);
        let err =
            negotiate_stream(&device, &request(FrameType::Uncompressed)).expect_err("refused");
        assert!(matches!(err, TransportError::FormatNotSupported(_)));
        assert_eq!(device.attempts().len(), 5);
    }

    #[test]
    fn identical_requests_negotiate_identically() {
        let device = FakeDevice::new(
            vec![uncompressed_descriptor(b"NV12")],
            vec![FrameFormat::Nv12],
        );
        let first =
            negotiate_stream(&device, &request(FrameType::Uncompressed)).expect("negotiate");
        let second =
            negotiate_stream(&device, &request(FrameType::Uncompressed)).expect("negotiate");
        assert_eq!(first, second);
    }
}
