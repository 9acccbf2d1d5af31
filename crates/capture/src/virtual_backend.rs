//! Virtual capture backend that emits patterned YUV_420_888 frames from its own thread.
use std::num::NonZeroU32;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use edgeview_core::prelude::*;
use smallvec::smallvec;
use tracing::{debug, warn};

use crate::{CaptureError, FrameSource, SourceDescriptor};

/// Default virtual frame rate.
pub const DEFAULT_VIRTUAL_FPS: u32 = 30;

/// How the synthetic camera lays out its chroma planes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChromaLayout {
    /// Separate U and V buffers, pixel stride 1.
    Planar,
    /// One buffer of interleaved `V,U` pairs. The U plane starts one byte in
    /// and both planes step by 2.
    #[default]
    SemiPlanar,
}

/// Settings for [`VirtualCapture`].
///
/// # Example
/// ```rust
/// use edgeview_capture::prelude::*;
///
/// let cfg = VirtualCaptureConfig::new(64, 48)
///     .with_fps(60)
///     .with_layout(ChromaLayout::Planar)
///     .with_row_padding(16);
/// assert_eq!(cfg.fps, 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VirtualCaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub layout: ChromaLayout,
    /// Extra bytes appended to every row of every plane.
    pub row_padding: usize,
    /// Format code stamped on emitted frames.
    pub format: FourCc,
}

impl Default for VirtualCaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: DEFAULT_VIRTUAL_FPS,
            layout: ChromaLayout::default(),
            row_padding: 0,
            format: FourCc::YUV_420_888,
        }
    }
}

impl VirtualCaptureConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_layout(mut self, layout: ChromaLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_row_padding(mut self, padding: usize) -> Self {
        self.row_padding = padding;
        self
    }

    pub fn with_format(mut self, format: FourCc) -> Self {
        self.format = format;
        self
    }

    fn sanitized(self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
            fps: self.fps.clamp(1, 1_000),
            ..self
        }
    }

    fn resolution(&self) -> Resolution {
        Resolution {
            width: NonZeroU32::new(self.width).unwrap_or(NonZeroU32::MIN),
            height: NonZeroU32::new(self.height).unwrap_or(NonZeroU32::MIN),
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.fps.max(1)))
    }
}

/// Build one synthetic frame.
///
/// Luma is a diagonal ramp that scrolls with `sequence`; chroma is a slow
/// horizontal/vertical sweep. Planes are ordered `[Y, U, V]`.
///
/// # Example
/// ```rust
/// use edgeview_capture::prelude::*;
///
/// let frame = synth_frame(&VirtualCaptureConfig::new(4, 2), 0);
/// let planes = frame.planes();
/// assert_eq!(planes.len(), 3);
/// assert_eq!(planes[1].pixel_stride(), 2);
/// ```
pub fn synth_frame(config: &VirtualCaptureConfig, sequence: u64) -> RawFrame {
    let config = config.sanitized();
    let width = config.width as usize;
    let height = config.height as usize;
    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    let shift = (sequence % 256) as usize;

    let luma_stride = width + config.row_padding;
    let mut luma = vec![0u8; luma_stride * height];
    for (y, row) in luma.chunks_exact_mut(luma_stride).enumerate() {
        for (x, px) in row[..width].iter_mut().enumerate() {
            *px = ((x + y + shift) % 256) as u8;
        }
    }

    let u_at = |x: usize, _y: usize| (64 + (x * 128) / chroma_width.max(1)) as u8;
    let v_at = |_x: usize, y: usize| (64 + (y * 128) / chroma_height.max(1)) as u8;
    let meta = FrameMeta::new(
        MediaFormat::new(config.format, config.resolution()),
        sequence.saturating_mul(config.interval().as_nanos() as u64),
    );

    match config.layout {
        ChromaLayout::Planar => {
            let stride = chroma_width + config.row_padding;
            let mut u = vec![0u8; stride * chroma_height];
            let mut v = vec![0u8; stride * chroma_height];
            for y in 0..chroma_height {
                for x in 0..chroma_width {
                    u[y * stride + x] = u_at(x, y);
                    v[y * stride + x] = v_at(x, y);
                }
            }
            RawFrame::new(
                meta,
                smallvec![luma, u, v],
                smallvec![
                    RawPlaneLayout::new(0, 0, luma_stride, 1),
                    RawPlaneLayout::new(1, 0, stride, 1),
                    RawPlaneLayout::new(2, 0, stride, 1),
                ],
            )
        }
        ChromaLayout::SemiPlanar => {
            let stride = chroma_width * 2 + config.row_padding;
            let mut vu = vec![0u8; stride * chroma_height];
            for y in 0..chroma_height {
                for x in 0..chroma_width {
                    vu[y * stride + 2 * x] = v_at(x, y);
                    vu[y * stride + 2 * x + 1] = u_at(x, y);
                }
            }
            RawFrame::new(
                meta,
                smallvec![luma, vu],
                smallvec![
                    RawPlaneLayout::new(0, 0, luma_stride, 1),
                    RawPlaneLayout::new(1, 1, stride, 2),
                    RawPlaneLayout::new(1, 0, stride, 2),
                ],
            )
        }
    }
}

/// Synthetic camera that pushes frames at a fixed rate once bound.
///
/// # Example
/// ```rust
/// use edgeview_capture::prelude::*;
///
/// let mut source = VirtualCapture::new(VirtualCaptureConfig::new(8, 8).with_fps(200));
/// let (tx, rx) = newest();
/// source.bind(tx).unwrap();
/// let frame = loop {
///     if let RecvOutcome::Data(frame) = rx.recv() {
///         break frame;
///     }
///     std::thread::sleep(std::time::Duration::from_millis(1));
/// };
/// source.unbind();
/// assert_eq!(frame.meta().format.code, FourCc::YUV_420_888);
/// ```
pub struct VirtualCapture {
    descriptor: SourceDescriptor,
    config: VirtualCaptureConfig,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl VirtualCapture {
    pub fn new(config: VirtualCaptureConfig) -> Self {
        let config = config.sanitized();
        let descriptor = SourceDescriptor::new(
            "virtual",
            MediaFormat::new(config.format, config.resolution()),
        )
        .with_fps(config.fps);
        Self {
            descriptor,
            config,
            stop_tx: None,
            worker: None,
        }
    }

    pub fn config(&self) -> &VirtualCaptureConfig {
        &self.config
    }
}

impl FrameSource for VirtualCapture {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn bind(&mut self, sink: NewestTx<RawFrame>) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyBound);
        }
        let config = self.config;
        let interval = config.interval();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name("edgeview-virtual".into())
            .spawn(move || {
                let mut sequence = 0u64;
                loop {
                    let frame = synth_frame(&config, sequence);
                    if matches!(sink.send(frame), SendOutcome::Closed) {
                        break;
                    }
                    sequence = sequence.wrapping_add(1);
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| CaptureError::Backend(format!("spawn virtual capture: {e}")))?;
        debug!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            "virtual capture bound"
        );
        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn unbind(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("virtual capture worker panicked");
            }
            debug!("virtual capture unbound");
        }
    }

    fn is_bound(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for VirtualCapture {
    fn drop(&mut self) {
        self.unbind();
    }
}
