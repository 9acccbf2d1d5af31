#![doc = include_str!("../README.md")]

use edgeview_core::prelude::*;

pub mod manual_backend;
pub mod virtual_backend;

/// Errors raised while binding or running a frame source.
///
/// # Example
/// ```rust
/// use edgeview_capture::CaptureError;
///
/// let err = CaptureError::Backend("camera busy".into());
/// assert_eq!(err.code(), "backend_error");
/// assert!(err.retryable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("source is already bound")]
    AlreadyBound,
    #[error("source is not bound")]
    NotBound,
    #[error("source cannot produce {0}")]
    Unsupported(FourCc),
    #[error("backend error: {0}")]
    Backend(String),
}

impl CaptureError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::AlreadyBound => "already_bound",
            CaptureError::NotBound => "not_bound",
            CaptureError::Unsupported(_) => "unsupported",
            CaptureError::Backend(_) => "backend_error",
        }
    }

    /// Whether the error may succeed when retried.
    pub fn retryable(&self) -> bool {
        matches!(self, CaptureError::Backend(_))
    }
}

/// What a source produces.
///
/// # Example
/// ```rust
/// use edgeview_capture::prelude::*;
///
/// let format = MediaFormat::new(FourCc::YUV_420_888, Resolution::new(640, 480).unwrap());
/// let descriptor = SourceDescriptor::new("front", format).with_fps(30);
/// assert_eq!(descriptor.fps, Some(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceDescriptor {
    /// Human-readable source name.
    pub name: String,
    /// Format of the frames the source emits.
    pub format: MediaFormat,
    /// Nominal frame rate, when the source has one.
    pub fps: Option<u32>,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, format: MediaFormat) -> Self {
        Self {
            name: name.into(),
            format,
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }
}

/// A producer of raw camera frames.
///
/// `bind` hands the source the sending half of a keep-only-latest channel;
/// from then on the source delivers frames from its own context, one at a
/// time. `unbind` must stop delivery before returning, so no frame is sent
/// after it completes.
///
/// # Example
/// ```rust
/// use edgeview_capture::prelude::*;
///
/// let (mut source, feeder) = ManualCapture::yuv420(4, 2);
/// let (tx, rx) = newest();
/// source.bind(tx).unwrap();
/// assert!(source.is_bound());
/// source.unbind();
/// assert!(!feeder.is_bound());
/// # drop(rx);
/// ```
pub trait FrameSource: Send {
    fn descriptor(&self) -> &SourceDescriptor;

    /// Start delivering frames into `sink`.
    fn bind(&mut self, sink: NewestTx<RawFrame>) -> Result<(), CaptureError>;

    /// Stop delivering frames. Calling this on an unbound source is a no-op.
    fn unbind(&mut self);

    fn is_bound(&self) -> bool;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn descriptor(&self) -> &SourceDescriptor {
        (**self).descriptor()
    }

    fn bind(&mut self, sink: NewestTx<RawFrame>) -> Result<(), CaptureError> {
        (**self).bind(sink)
    }

    fn unbind(&mut self) {
        (**self).unbind()
    }

    fn is_bound(&self) -> bool {
        (**self).is_bound()
    }
}

pub mod prelude {
    pub use crate::{
        CaptureError, FrameSource, SourceDescriptor,
        manual_backend::{ManualCapture, ManualFeeder},
        virtual_backend::{ChromaLayout, VirtualCapture, VirtualCaptureConfig, synth_frame},
    };
    pub use edgeview_core::prelude::*;
}
