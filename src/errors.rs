// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the preview engine
//!
//! Only negotiation and stream-open failures surface to the caller of a
//! lifecycle operation. Everything frame-level (bad frames, failed
//! allocations, failed conversions, surface lock refusals) is recovered
//! locally by dropping the frame and logging; the session never aborts
//! because of a single frame.

use crate::frame::FrameFormat;
use crate::session::SessionState;
use std::fmt;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result alias for session lifecycle operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result alias for pixel format conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors reported by the USB/UVC transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device refused the requested format/size/rate combination.
    FormatNotSupported(String),
    /// The device or an endpoint is busy.
    Busy,
    /// The device went away.
    Disconnected,
    /// Transfer-level I/O failure.
    Io(String),
    /// Anything the transport cannot classify.
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::FormatNotSupported(msg) => {
                write!(f, "format not supported: {}", msg)
            }
            TransportError::Busy => write!(f, "device busy"),
            TransportError::Disconnected => write!(f, "device disconnected"),
            TransportError::Io(msg) => write!(f, "transport I/O error: {}", msg),
            TransportError::Other(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Format negotiation failed for every candidate format.
    Negotiation(TransportError),
    /// The transport refused to start the stream.
    Stream(TransportError),
    /// `start` requires a bound preview surface.
    NoPreviewSurface,
    /// The operation is not allowed in the session's current state.
    InvalidState(SessionState),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Negotiation(e) => write!(f, "negotiation failed: {}", e),
            SessionError::Stream(e) => write!(f, "failed to start stream: {}", e),
            SessionError::NoPreviewSurface => {
                write!(f, "cannot start preview without a preview surface")
            }
            SessionError::InvalidState(state) => {
                write!(f, "operation not allowed in state {:?}", state)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors reported by pixel format converters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Source payload is shorter than the format requires.
    ShortInput { needed: usize, got: usize },
    /// The frame geometry is invalid for the output format (e.g. odd
    /// dimensions for a 4:2:0 layout).
    BadDimensions { width: u32, height: u32 },
    /// Destination buffer could not be grown to the output size.
    OutputAllocation(usize),
    /// The source format has no converter for the requested output.
    Unsupported(FrameFormat),
    /// Compressed payload failed to decode.
    Decode(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::ShortInput { needed, got } => {
                write!(f, "input too short: need {} bytes, got {}", needed, got)
            }
            ConvertError::BadDimensions { width, height } => {
                write!(f, "invalid frame geometry {}x{}", width, height)
            }
            ConvertError::OutputAllocation(bytes) => {
                write!(f, "failed to allocate {} output bytes", bytes)
            }
            ConvertError::Unsupported(format) => {
                write!(f, "no converter for {} input", format)
            }
            ConvertError::Decode(msg) => write!(f, "decode failed: {}", msg),
        }
    }
}

impl std::error::Error for ConvertError {}

/// Errors reported by a render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The windowing system refused to lock the backing buffer.
    LockFailed,
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::LockFailed => write!(f, "failed to lock surface buffer"),
        }
    }
}

impl std::error::Error for SurfaceError {}
