//! Source driven by the caller: frames arrive whenever the feeder pushes them.
use std::sync::Arc;

use edgeview_core::prelude::*;
use parking_lot::Mutex;

use crate::{CaptureError, FrameSource, SourceDescriptor};

#[derive(Default)]
struct ManualShared {
    sink: Mutex<Option<NewestTx<RawFrame>>>,
    fail_next_bind: Mutex<Option<String>>,
}

/// Frame source fed by a [`ManualFeeder`].
///
/// # Example
/// ```rust
/// use edgeview_capture::prelude::*;
///
/// let (mut source, feeder) = ManualCapture::yuv420(4, 2);
/// let frame = synth_frame(&VirtualCaptureConfig::new(4, 2), 0);
/// assert_eq!(feeder.push(frame.clone()), SendOutcome::Closed);
///
/// let (tx, rx) = newest();
/// source.bind(tx).unwrap();
/// assert_eq!(feeder.push(frame), SendOutcome::Ok);
/// assert!(matches!(rx.recv(), RecvOutcome::Data(_)));
/// ```
pub struct ManualCapture {
    descriptor: SourceDescriptor,
    shared: Arc<ManualShared>,
}

/// Handle used to push frames into a bound [`ManualCapture`].
#[derive(Clone)]
pub struct ManualFeeder {
    shared: Arc<ManualShared>,
}

impl ManualCapture {
    pub fn new(descriptor: SourceDescriptor) -> (Self, ManualFeeder) {
        let shared = Arc::new(ManualShared::default());
        (
            Self {
                descriptor,
                shared: shared.clone(),
            },
            ManualFeeder { shared },
        )
    }

    /// Manual source advertising YUV_420_888 at the given size.
    pub fn yuv420(width: u32, height: u32) -> (Self, ManualFeeder) {
        let resolution = Resolution::new(width, height).unwrap_or(MIN_RESOLUTION);
        let format = MediaFormat::new(FourCc::YUV_420_888, resolution);
        Self::new(SourceDescriptor::new("manual", format))
    }

    /// Make the next `bind` fail with a backend error carrying `reason`.
    pub fn fail_next_bind(&self, reason: impl Into<String>) {
        *self.shared.fail_next_bind.lock() = Some(reason.into());
    }
}

const MIN_RESOLUTION: Resolution = Resolution {
    width: std::num::NonZeroU32::MIN,
    height: std::num::NonZeroU32::MIN,
};

impl ManualFeeder {
    /// Deliver a frame. Returns `Closed` when the source is not bound.
    pub fn push(&self, frame: RawFrame) -> SendOutcome {
        match self.shared.sink.lock().as_ref() {
            Some(tx) => tx.send(frame),
            None => SendOutcome::Closed,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.shared.sink.lock().is_some()
    }
}

impl FrameSource for ManualCapture {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn bind(&mut self, sink: NewestTx<RawFrame>) -> Result<(), CaptureError> {
        if let Some(reason) = self.shared.fail_next_bind.lock().take() {
            return Err(CaptureError::Backend(reason));
        }
        let mut slot = self.shared.sink.lock();
        if slot.is_some() {
            return Err(CaptureError::AlreadyBound);
        }
        *slot = Some(sink);
        Ok(())
    }

    fn unbind(&mut self) {
        self.shared.sink.lock().take();
    }

    fn is_bound(&self) -> bool {
        self.shared.sink.lock().is_some()
    }
}

impl Drop for ManualCapture {
    fn drop(&mut self) {
        self.unbind();
    }
}
