//! Pipeline that wires a frame source, the conversion worker and the output slot together.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use edgeview_capture::prelude::*;
use edgeview_codec::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::config::{PipelineTunables, pipeline_tunables};
use crate::metrics::PipelineMetrics;
use crate::render::{FrameReceiver, FrameRenderer, TextureSink};

type FrameReadyFn = dyn Fn(FrameDimensions) + Send + Sync;

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Stopped = 0,
    /// Source is being bound and the worker spawned.
    Starting = 1,
    Running = 2,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Starting,
            2 => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }
}

/// Errors crossing the pipeline boundary. Per-frame failures never do.
///
/// # Example
/// ```rust
/// use edgeview::prelude::*;
///
/// let err = PipelineError::from(CaptureError::Backend("camera busy".into()));
/// assert_eq!(err.code(), "bind_failed");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline already started")]
    AlreadyRunning,
    #[error("failed to bind source: {0}")]
    Bind(#[from] CaptureError),
    #[error("conversion worker: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::AlreadyRunning => "already_running",
            PipelineError::Bind(_) => "bind_failed",
            PipelineError::Worker(_) => "worker_failed",
        }
    }
}

/// Observes a pipeline's state from any thread.
#[derive(Clone)]
pub struct PipelineStatus {
    state: Arc<AtomicU8>,
}

impl PipelineStatus {
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }
}

/// Builder for a [`Pipeline`].
///
/// # Example
/// ```rust
/// use edgeview::prelude::*;
///
/// let (source, _feeder) = ManualCapture::yuv420(640, 480);
/// let pipeline = PipelineBuilder::new(source)
///     .processor(EdgeDetector::new(50, 150))
///     .on_frame_ready(|dims| println!("frame ready: {dims}"))
///     .build();
/// assert_eq!(pipeline.state(), PipelineState::Stopped);
/// ```
pub struct PipelineBuilder {
    source: Box<dyn FrameSource>,
    processor: Option<Arc<dyn FrameProcessor>>,
    notifier: Option<Arc<FrameReadyFn>>,
    tunables: Option<PipelineTunables>,
}

impl PipelineBuilder {
    pub fn new(source: impl FrameSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            processor: None,
            notifier: None,
            tunables: None,
        }
    }

    /// Attach an RGBA processor run after conversion.
    pub fn processor(self, processor: impl FrameProcessor) -> Self {
        self.shared_processor(Arc::new(processor))
    }

    /// Attach a processor that is shared with other owners.
    pub fn shared_processor(mut self, processor: Arc<dyn FrameProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Called on the worker after every frame deposited into the output slot.
    ///
    /// Carries only the dimensions; the frame itself is pulled via
    /// [`Pipeline::receiver`].
    pub fn on_frame_ready<F>(mut self, notify: F) -> Self
    where
        F: Fn(FrameDimensions) + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notify));
        self
    }

    /// Per-pipeline tunables; otherwise the process-wide ones are used.
    pub fn tunables(mut self, tunables: PipelineTunables) -> Self {
        self.tunables = Some(tunables);
        self
    }

    pub fn build(self) -> Pipeline {
        let tunables = self.tunables.unwrap_or_else(pipeline_tunables).sanitized();
        Pipeline {
            source: self.source,
            processor: self.processor,
            notifier: self.notifier,
            tunables,
            state: Arc::new(AtomicU8::new(PipelineState::Stopped as u8)),
            processing: Arc::new(AtomicBool::new(tunables.processing_enabled)),
            output: Arc::new(FrameSlot::new()),
            metrics: PipelineMetrics::with_window(tunables.metrics_window),
            run: None,
        }
    }
}

struct RunHandle {
    rx: NewestRx<RawFrame>,
    worker: thread::JoinHandle<()>,
}

/// Camera-to-renderer frame pipeline.
///
/// While running, frames from the source are repacked, converted, optionally
/// processed and deposited into a single output slot. Readers obtained from
/// [`Pipeline::receiver`] stay valid across restarts.
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    processor: Option<Arc<dyn FrameProcessor>>,
    notifier: Option<Arc<FrameReadyFn>>,
    tunables: PipelineTunables,
    state: Arc<AtomicU8>,
    processing: Arc<AtomicBool>,
    output: Arc<FrameSlot<RgbaFrame>>,
    metrics: PipelineMetrics,
    run: Option<RunHandle>,
}

impl Pipeline {
    /// Bind the source and start the conversion worker.
    ///
    /// On failure the pipeline is left `Stopped` and may be started again.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self
            .state
            .compare_exchange(
                PipelineState::Stopped as u8,
                PipelineState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }
        let descriptor = self.source.descriptor();
        info!(
            source = %descriptor.name,
            format = %descriptor.format.code,
            width = descriptor.format.resolution.width.get(),
            height = descriptor.format.resolution.height.get(),
            "pipeline starting"
        );

        let (tx, rx) = newest::<RawFrame>();
        if let Err(err) = self.source.bind(tx) {
            warn!(code = err.code(), error = %err, "source bind failed");
            self.set_state(PipelineState::Stopped);
            return Err(err.into());
        }

        let worker = Worker {
            rx: rx.clone(),
            repacker: YuvRepacker::new(self.tunables.chroma_order),
            converter: ColorConverter::new(),
            processor: self.processor.clone(),
            notifier: self.notifier.clone(),
            processing: self.processing.clone(),
            output: self.output.clone(),
            metrics: self.metrics.clone(),
            idle_wait: Duration::from_millis(self.tunables.idle_wait_ms),
        };
        let spawned = thread::Builder::new()
            .name("edgeview-convert".into())
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                error!(error = %err, "failed to spawn conversion worker");
                self.source.unbind();
                rx.close();
                self.set_state(PipelineState::Stopped);
                return Err(PipelineError::Worker(err.to_string()));
            }
        };
        self.run = Some(RunHandle { rx, worker: handle });
        self.set_state(PipelineState::Running);
        info!("pipeline running");
        Ok(())
    }

    /// Release the source, stop the worker and discard any undelivered frame.
    ///
    /// Safe to call in any state and more than once.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        self.source.unbind();
        run.rx.close();
        if run.worker.join().is_err() {
            error!("conversion worker panicked");
        }
        self.output.clear();
        self.set_state(PipelineState::Stopped);
        let counters = &self.metrics.counters;
        info!(
            received = counters.received(),
            delivered = counters.delivered(),
            dropped = counters.replaced(),
            rejected = counters.rejected(),
            failed = counters.failed(),
            "pipeline stopped"
        );
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            state: self.state.clone(),
        }
    }

    /// Reader for finished frames.
    pub fn receiver(&self) -> FrameReceiver {
        FrameReceiver::from_slot(self.output.clone())
    }

    /// Renderer pulling from this pipeline, recording into its render metrics.
    pub fn renderer<S: TextureSink>(&self, sink: S) -> FrameRenderer<S> {
        FrameRenderer::with_metrics(self.receiver(), sink, self.metrics.render.clone())
    }

    /// Turn the attached processor on or off; takes effect from the next frame.
    pub fn set_processing_enabled(&self, enabled: bool) {
        self.processing.store(enabled, Ordering::Relaxed);
        debug!(enabled, "processing toggled");
    }

    pub fn processing_enabled(&self) -> bool {
        self.processing.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.clone()
    }

    pub fn source(&self) -> &SourceDescriptor {
        self.source.descriptor()
    }

    pub fn tunables(&self) -> PipelineTunables {
        self.tunables
    }

    fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Best-effort shutdown when the owner forgot to stop.
        self.stop();
    }
}

struct Worker {
    rx: NewestRx<RawFrame>,
    repacker: YuvRepacker,
    converter: ColorConverter,
    processor: Option<Arc<dyn FrameProcessor>>,
    notifier: Option<Arc<FrameReadyFn>>,
    processing: Arc<AtomicBool>,
    output: Arc<FrameSlot<RgbaFrame>>,
    metrics: PipelineMetrics,
    idle_wait: Duration,
}

impl Worker {
    fn run(self) {
        loop {
            match self.rx.recv() {
                RecvOutcome::Data(frame) => self.handle(frame),
                RecvOutcome::Empty => {
                    if self.idle_wait.is_zero() {
                        thread::yield_now();
                    } else {
                        thread::sleep(self.idle_wait);
                    }
                }
                RecvOutcome::Closed => break,
            }
        }
        debug!("conversion worker exiting");
    }

    fn handle(&self, raw: RawFrame) {
        let counters = &self.metrics.counters;
        counters.inc_received();
        let timestamp = raw.meta().timestamp;
        let rgba = match catch_unwind(AssertUnwindSafe(|| self.convert(&raw))) {
            Ok(Ok(rgba)) => rgba,
            Ok(Err(err)) if err.is_unsupported() => {
                counters.inc_rejected();
                warn!(
                    timestamp,
                    format = %raw.meta().format.code,
                    "dropping frame with unsupported format"
                );
                return;
            }
            Ok(Err(err)) => {
                counters.inc_failed();
                error!(timestamp, code = err.code(), error = %err, "frame conversion failed; frame dropped");
                return;
            }
            Err(_) => {
                counters.inc_failed();
                error!(timestamp, "frame conversion panicked; frame dropped");
                return;
            }
        };
        drop(raw);

        let frame = self.process(rgba);
        let dims = frame.dims();
        if self.output.deposit(frame) == SendOutcome::Replaced {
            counters.inc_replaced();
            trace!(timestamp, "replaced unconsumed frame");
        }
        counters.inc_delivered();

        if let Some(notify) = &self.notifier
            && catch_unwind(AssertUnwindSafe(|| notify(dims))).is_err()
        {
            warn!("frame-ready notifier panicked");
        }
    }

    fn convert(&self, raw: &RawFrame) -> Result<RgbaFrame, CodecError> {
        let start = Instant::now();
        let yuv = self.repacker.repack_frame(raw)?;
        self.metrics.repack.record(start.elapsed());

        let start = Instant::now();
        let rgba = self.converter.convert(yuv);
        self.metrics.convert.record(start.elapsed());
        Ok(rgba)
    }

    fn process(&self, frame: RgbaFrame) -> RgbaFrame {
        let Some(processor) = &self.processor else {
            return frame;
        };
        if !self.processing.load(Ordering::Relaxed) {
            return frame;
        }
        let start = Instant::now();
        match apply_best_effort(processor.as_ref(), frame) {
            ProcessOutcome::Processed(out) => {
                self.metrics.process.record(start.elapsed());
                out
            }
            ProcessOutcome::PassedThrough(out, err) => {
                self.metrics.counters.inc_passthrough();
                debug!(
                    processor = processor.name(),
                    code = err.code(),
                    error = %err,
                    "processor bypassed; showing unprocessed frame"
                );
                out
            }
        }
    }
}
