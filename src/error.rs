//! Crate-level error types.

use std::fmt;

use crate::gpu::device::{Capability, FramebufferStatus};
use crate::gpu::render_context::RenderContextError;

/// Errors produced while decoding an encoded bitmap.
#[derive(Debug)]
pub enum DecodeError {
    /// The asset could not be read.
    Io(std::io::Error),
    /// The byte stream is not a supported or well-formed image.
    Malformed(String),
    /// The decoded image has a channel layout the uploader cannot take.
    UnsupportedComponents(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "unreadable asset: {e}"),
            Self::Malformed(msg) => write!(f, "malformed image: {msg}"),
            Self::UnsupportedComponents(n) => {
                write!(f, "unsupported component count: {n}")
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors produced by the vistex crate.
///
/// Every texture entry point that can fail also leaves the resource in a
/// well-defined invalid state, so these are informational: a caller that
/// ignores them still sees `bind()` return `false`.
#[derive(Debug)]
pub enum TextureError {
    /// A required device feature is missing.
    CapabilityUnavailable(Capability),
    /// The framebuffer completeness check did not report complete.
    AllocationIncomplete(FramebufferStatus),
    /// Bitmap decode failed.
    Decode(DecodeError),
    /// The operation is not valid in the current state.
    StateMisuse(&'static str),
    /// Zero-sized render target or upload.
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Failed to spawn a decode worker.
    ThreadSpawn(std::io::Error),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// Viewer event-loop failure.
    Viewer(String),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityUnavailable(cap) => {
                write!(f, "device capability unavailable: {cap}")
            }
            Self::AllocationIncomplete(status) => {
                write!(f, "framebuffer incomplete: {status}")
            }
            Self::Decode(e) => write!(f, "decode failed: {e}"),
            Self::StateMisuse(msg) => write!(f, "invalid state: {msg}"),
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid dimensions {width}x{height}")
            }
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn thread: {e}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Viewer(msg) => write!(f, "viewer error: {msg}"),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Gpu(e) => Some(e),
            Self::Io(e) | Self::ThreadSpawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for TextureError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<RenderContextError> for TextureError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
