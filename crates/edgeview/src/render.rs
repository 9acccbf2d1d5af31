//! Consumer side: pulling finished frames and pushing them into a texture.
use std::sync::Arc;
use std::time::Instant;

use edgeview_core::prelude::*;

use crate::metrics::StageMetrics;

/// Read end of a pipeline's output slot.
///
/// Cheap to clone; every clone takes from the same slot, so a given frame is
/// seen by exactly one caller.
#[derive(Clone)]
pub struct FrameReceiver {
    slot: Arc<FrameSlot<RgbaFrame>>,
}

impl FrameReceiver {
    /// Wrap an existing slot, e.g. to drive a renderer without a pipeline.
    pub fn from_slot(slot: Arc<FrameSlot<RgbaFrame>>) -> Self {
        Self { slot }
    }

    /// Take the newest finished frame, if one arrived since the last take.
    pub fn take(&self) -> Option<RgbaFrame> {
        self.slot.take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_occupied()
    }
}

/// Destination for RGBA frames, typically a GPU texture.
///
/// `allocate` is a full upload that (re)creates storage for the frame's
/// dimensions. `update` overwrites existing storage of the same dimensions.
pub trait TextureSink {
    fn allocate(&mut self, frame: &RgbaFrame);

    fn update(&mut self, frame: &RgbaFrame);
}

/// What a call to [`FrameRenderer::draw`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// New frame with new dimensions; texture storage was allocated.
    Uploaded(FrameDimensions),
    /// New frame written into the existing texture.
    Updated(FrameDimensions),
    /// No new frame; the previous texture is drawn again.
    Reused(FrameDimensions),
    /// Nothing has been uploaded yet.
    Idle,
}

/// Pulls frames at the display's cadence and feeds a [`TextureSink`].
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use edgeview::prelude::*;
///
/// #[derive(Default)]
/// struct Counting { allocs: usize, updates: usize }
///
/// impl TextureSink for Counting {
///     fn allocate(&mut self, _frame: &RgbaFrame) { self.allocs += 1; }
///     fn update(&mut self, _frame: &RgbaFrame) { self.updates += 1; }
/// }
///
/// let slot = Arc::new(FrameSlot::new());
/// let mut renderer = FrameRenderer::new(FrameReceiver::from_slot(slot.clone()), Counting::default());
/// assert_eq!(renderer.draw(), DrawOutcome::Idle);
///
/// let dims = FrameDimensions::new(2, 2).unwrap();
/// slot.deposit(RgbaFrame::opaque_black(dims));
/// assert_eq!(renderer.draw(), DrawOutcome::Uploaded(dims));
/// assert_eq!(renderer.draw(), DrawOutcome::Reused(dims));
/// ```
pub struct FrameRenderer<S> {
    receiver: FrameReceiver,
    sink: S,
    texture: Option<FrameDimensions>,
    metrics: StageMetrics,
}

impl<S: TextureSink> FrameRenderer<S> {
    pub fn new(receiver: FrameReceiver, sink: S) -> Self {
        Self::with_metrics(receiver, sink, StageMetrics::default())
    }

    /// Record upload timings into an existing metrics handle.
    pub fn with_metrics(receiver: FrameReceiver, sink: S, metrics: StageMetrics) -> Self {
        Self {
            receiver,
            sink,
            texture: None,
            metrics,
        }
    }

    /// Upload the newest frame if there is one.
    pub fn draw(&mut self) -> DrawOutcome {
        let Some(frame) = self.receiver.take() else {
            return match self.texture {
                Some(dims) => DrawOutcome::Reused(dims),
                None => DrawOutcome::Idle,
            };
        };
        let dims = frame.dims();
        let start = Instant::now();
        let outcome = if self.texture == Some(dims) {
            self.sink.update(&frame);
            DrawOutcome::Updated(dims)
        } else {
            self.sink.allocate(&frame);
            self.texture = Some(dims);
            DrawOutcome::Uploaded(dims)
        };
        self.metrics.record(start.elapsed());
        outcome
    }

    /// Forget the current texture so the next frame is a full upload,
    /// e.g. after the graphics context was lost.
    pub fn invalidate(&mut self) {
        self.texture = None;
    }

    pub fn texture_dims(&self) -> Option<FrameDimensions> {
        self.texture
    }

    /// Upload timings; `fps()` is the displayed frame rate.
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Allocate(u32, u32),
        Update(u32, u32),
    }

    #[derive(Default)]
    struct Recording(Vec<Call>);

    impl TextureSink for Recording {
        fn allocate(&mut self, frame: &RgbaFrame) {
            self.0
                .push(Call::Allocate(frame.dims().width(), frame.dims().height()));
        }

        fn update(&mut self, frame: &RgbaFrame) {
            self.0
                .push(Call::Update(frame.dims().width(), frame.dims().height()));
        }
    }

    fn setup() -> (Arc<FrameSlot<RgbaFrame>>, FrameRenderer<Recording>) {
        let slot = Arc::new(FrameSlot::new());
        let renderer = FrameRenderer::new(FrameReceiver::from_slot(slot.clone()), Recording::default());
        (slot, renderer)
    }

    #[test]
    fn first_frame_allocates_then_updates() {
        let (slot, mut renderer) = setup();
        let dims = FrameDimensions::new(4, 2).unwrap();
        slot.deposit(RgbaFrame::opaque_black(dims));
        assert_eq!(renderer.draw(), DrawOutcome::Uploaded(dims));
        slot.deposit(RgbaFrame::opaque_black(dims));
        assert_eq!(renderer.draw(), DrawOutcome::Updated(dims));
        assert_eq!(renderer.sink().0, vec![Call::Allocate(4, 2), Call::Update(4, 2)]);
        assert_eq!(renderer.metrics().total_samples(), 2);
    }

    #[test]
    fn dimension_change_reallocates() {
        let (slot, mut renderer) = setup();
        slot.deposit(RgbaFrame::opaque_black(FrameDimensions::new(4, 2).unwrap()));
        renderer.draw();
        let bigger = FrameDimensions::new(8, 4).unwrap();
        slot.deposit(RgbaFrame::opaque_black(bigger));
        assert_eq!(renderer.draw(), DrawOutcome::Uploaded(bigger));
        assert_eq!(renderer.texture_dims(), Some(bigger));
    }

    #[test]
    fn no_new_frame_reuses_texture() {
        let (slot, mut renderer) = setup();
        assert_eq!(renderer.draw(), DrawOutcome::Idle);
        let dims = FrameDimensions::new(2, 2).unwrap();
        slot.deposit(RgbaFrame::opaque_black(dims));
        renderer.draw();
        assert_eq!(renderer.draw(), DrawOutcome::Reused(dims));
        assert_eq!(renderer.sink().0.len(), 1);
    }

    #[test]
    fn only_latest_of_burst_is_drawn() {
        let (slot, mut renderer) = setup();
        for w in [2, 4, 6] {
            slot.deposit(RgbaFrame::opaque_black(FrameDimensions::new(w, 2).unwrap()));
        }
        renderer.draw();
        assert_eq!(renderer.into_sink().0, vec![Call::Allocate(6, 2)]);
    }

    #[test]
    fn invalidate_forces_full_upload() {
        let (slot, mut renderer) = setup();
        let dims = FrameDimensions::new(2, 2).unwrap();
        slot.deposit(RgbaFrame::opaque_black(dims));
        renderer.draw();
        renderer.invalidate();
        slot.deposit(RgbaFrame::opaque_black(dims));
        assert_eq!(renderer.draw(), DrawOutcome::Uploaded(dims));
    }
}
