#![doc = include_str!("../README.md")]

use edgeview_core::prelude::FourCc;

pub mod convert;
pub mod processor;
pub mod repack;

/// Errors emitted by the repack and convert stages.
///
/// # Example
/// ```rust
/// use edgeview_codec::CodecError;
/// use edgeview_core::prelude::FourCc;
///
/// let err = CodecError::FormatMismatch {
///     expected: FourCc::YUV_420_888,
///     actual: FourCc::RGBA,
/// };
/// assert_eq!(err.code(), "format_mismatch");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input did not match the expected FourCc.
    #[error("format mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        /// Expected input FourCc.
        expected: FourCc,
        /// Actual FourCc encountered.
        actual: FourCc,
    },
    /// Width or height is zero or odd.
    #[error("invalid dimensions {width}x{height}: both sides must be even and non-zero")]
    InvalidDimensions { width: u32, height: u32 },
    /// A plane cannot address every sample the geometry requires.
    #[error("plane {plane} too short: needs {required} bytes, has {actual}")]
    PlaneTooShort {
        plane: usize,
        required: usize,
        actual: usize,
    },
    /// Strides that cannot describe a plane (zero pixel stride, overlapping rows).
    #[error("plane {plane} has invalid strides (row {row_stride}, pixel {pixel_stride})")]
    InvalidStride {
        plane: usize,
        row_stride: usize,
        pixel_stride: usize,
    },
    /// Fewer planes than the layout needs.
    #[error("expected 3 planes, got {0}")]
    MissingPlanes(usize),
    /// Destination buffer has the wrong length.
    #[error("destination buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

impl CodecError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::FormatMismatch { .. } => "format_mismatch",
            CodecError::InvalidDimensions { .. } => "invalid_dimensions",
            CodecError::PlaneTooShort { .. } => "plane_too_short",
            CodecError::InvalidStride { .. } => "invalid_stride",
            CodecError::MissingPlanes(_) => "missing_planes",
            CodecError::BufferSize { .. } => "buffer_size",
        }
    }

    /// Whether the frame was refused for its format rather than for being malformed.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CodecError::FormatMismatch { .. })
    }
}

pub mod prelude {
    pub use crate::{
        CodecError,
        convert::{ColorConverter, yuv_to_rgba},
        processor::{
            EdgeDetector, FrameProcessor, ProcessOutcome, ProcessorError, UnavailableProcessor,
            apply_best_effort,
        },
        repack::YuvRepacker,
    };
}
