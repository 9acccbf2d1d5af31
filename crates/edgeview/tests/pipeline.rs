use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use edgeview::prelude::*;
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn fast_tunables() -> PipelineTunables {
    PipelineTunables {
        idle_wait_ms: 1,
        ..PipelineTunables::default()
    }
}

/// Planar frame with tightly packed planes.
fn planar(code: FourCc, width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> RawFrame {
    let format = MediaFormat::new(code, Resolution::new(width, height).unwrap());
    let cw = (width / 2) as usize;
    RawFrame::new(
        FrameMeta::new(format, 0),
        vec![y, u, v].into(),
        vec![
            RawPlaneLayout::new(0, 0, width as usize, 1),
            RawPlaneLayout::new(1, 0, cw, 1),
            RawPlaneLayout::new(2, 0, cw, 1),
        ]
        .into(),
    )
}

fn fixture() -> RawFrame {
    planar(
        FourCc::YUV_420_888,
        4,
        2,
        vec![16, 100, 180, 235, 50, 81, 128, 255],
        vec![90, 200],
        vec![240, 60],
    )
}

#[rustfmt::skip]
const FIXTURE_RGBA: [u8; 32] = [
    178, 0, 0, 255,   255, 21, 21, 255,   82, 218, 255, 255,   146, 255, 255, 255,
    218, 0, 0, 255,   254, 0, 0, 255,     21, 157, 255, 255,   169, 255, 255, 255,
];

/// Dark left half, bright right half, neutral chroma.
fn luma_step(width: u32, height: u32) -> RawFrame {
    let y = (0..height)
        .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 16 } else { 235 }))
        .collect();
    let chroma_len = (width / 2 * height / 2) as usize;
    planar(
        FourCc::YUV_420_888,
        width,
        height,
        y,
        vec![128; chroma_len],
        vec![128; chroma_len],
    )
}

fn take_frame(receiver: &FrameReceiver) -> RgbaFrame {
    let mut frame = None;
    wait_for("converted frame", || {
        frame = receiver.take();
        frame.is_some()
    });
    frame.unwrap()
}

#[test]
fn lifecycle_start_stop_restart() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source).tunables(fast_tunables()).build();
    let status = pipeline.status();
    assert_eq!(pipeline.state(), PipelineState::Stopped);

    pipeline.start().unwrap();
    assert!(status.is_running());
    assert!(feeder.is_bound());
    let err = pipeline.start().unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyRunning));
    assert_eq!(err.code(), "already_running");

    pipeline.stop();
    pipeline.stop();
    assert_eq!(status.state(), PipelineState::Stopped);
    assert!(!feeder.is_bound());
    assert_eq!(feeder.push(fixture()), SendOutcome::Closed);

    // Receivers taken before a restart keep working.
    let receiver = pipeline.receiver();
    pipeline.start().unwrap();
    feeder.push(fixture());
    assert_eq!(take_frame(&receiver).as_bytes(), &FIXTURE_RGBA);
    pipeline.stop();
}

#[test]
fn failed_bind_leaves_pipeline_stopped() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    source.fail_next_bind("device busy");
    let mut pipeline = PipelineBuilder::new(source).tunables(fast_tunables()).build();

    let err = pipeline.start().unwrap_err();
    assert_eq!(err.code(), "bind_failed");
    assert!(matches!(err, PipelineError::Bind(CaptureError::Backend(_))));
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(!feeder.is_bound());

    pipeline.start().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Running);
}

#[test]
fn converts_fixture_exactly() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source).tunables(fast_tunables()).build();
    pipeline.start().unwrap();
    feeder.push(fixture());

    let frame = take_frame(&pipeline.receiver());
    assert_eq!(frame.dims(), FrameDimensions::new(4, 2).unwrap());
    assert_eq!(frame.as_bytes(), &FIXTURE_RGBA);

    let metrics = pipeline.metrics();
    assert_eq!(metrics.counters.received(), 1);
    assert_eq!(metrics.counters.delivered(), 1);
    assert_eq!(metrics.repack.total_samples(), 1);
    assert_eq!(metrics.convert.total_samples(), 1);
}

#[test]
fn bad_frames_are_dropped_without_stopping() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source).tunables(fast_tunables()).build();
    let counters = pipeline.metrics().counters;
    let receiver = pipeline.receiver();
    pipeline.start().unwrap();

    feeder.push(fixture());
    take_frame(&receiver);

    let wrong_format = planar(
        FourCc::NV12,
        4,
        2,
        vec![0; 8],
        vec![128; 2],
        vec![128; 2],
    );
    feeder.push(wrong_format);
    wait_for("rejected frame", || counters.rejected() == 1);

    let short_luma = planar(
        FourCc::YUV_420_888,
        4,
        2,
        vec![0; 3],
        vec![128; 2],
        vec![128; 2],
    );
    feeder.push(short_luma);
    wait_for("failed frame", || counters.failed() == 1);
    assert!(receiver.take().is_none());

    feeder.push(fixture());
    assert_eq!(take_frame(&receiver).as_bytes(), &FIXTURE_RGBA);
    assert_eq!(pipeline.state(), PipelineState::Running);
    assert_eq!(counters.received(), 4);
    assert_eq!(counters.delivered(), 2);
}

#[test]
fn unavailable_processor_passes_frames_through() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source)
        .processor(UnavailableProcessor)
        .tunables(fast_tunables())
        .build();
    pipeline.start().unwrap();
    feeder.push(fixture());

    assert_eq!(take_frame(&pipeline.receiver()).as_bytes(), &FIXTURE_RGBA);
    assert_eq!(pipeline.metrics().counters.passthrough(), 1);
    assert_eq!(pipeline.metrics().process.total_samples(), 0);
}

#[test]
fn edge_detection_can_be_toggled() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(8, 2);
    let mut pipeline = PipelineBuilder::new(source)
        .processor(EdgeDetector::default())
        .tunables(fast_tunables())
        .build();
    let receiver = pipeline.receiver();
    pipeline.start().unwrap();
    assert!(pipeline.processing_enabled());

    feeder.push(luma_step(8, 2));
    let edges = take_frame(&receiver);
    for y in 0..2 {
        assert_eq!(edges.pixel(3, y), Some([255, 255, 255, 255]));
        assert_eq!(edges.pixel(4, y), Some([0, 0, 0, 255]));
        assert_eq!(edges.pixel(0, y), Some([0, 0, 0, 255]));
    }
    assert_eq!(pipeline.metrics().process.total_samples(), 1);

    pipeline.set_processing_enabled(false);
    feeder.push(luma_step(8, 2));
    let plain = take_frame(&receiver);
    assert_eq!(plain.pixel(0, 0), Some([0, 0, 0, 255]));
    assert_eq!(plain.pixel(4, 0), Some([254, 254, 254, 255]));
}

#[test]
fn notifier_reports_each_delivery() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source)
        .tunables(fast_tunables())
        .on_frame_ready({
            let seen = seen.clone();
            let calls = calls.clone();
            move |dims| {
                seen.lock().push(dims);
                calls.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();
    pipeline.start().unwrap();

    feeder.push(fixture());
    wait_for("first notification", || calls.load(Ordering::SeqCst) == 1);
    feeder.push(fixture());
    wait_for("second notification", || calls.load(Ordering::SeqCst) == 2);

    let dims = FrameDimensions::new(4, 2).unwrap();
    assert_eq!(*seen.lock(), vec![dims, dims]);
    // Nobody took the first frame before the second landed.
    assert_eq!(pipeline.metrics().dropped(), 1);
}

#[test]
fn panicking_notifier_does_not_stop_delivery() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source)
        .tunables(fast_tunables())
        .on_frame_ready(|_| panic!("listener bug"))
        .build();
    let receiver = pipeline.receiver();
    pipeline.start().unwrap();
    feeder.push(fixture());
    take_frame(&receiver);
    feeder.push(fixture());
    take_frame(&receiver);
    assert_eq!(pipeline.metrics().counters.delivered(), 2);
}

#[test]
fn stop_discards_undelivered_frame() {
    init_tracing();
    let (source, feeder) = ManualCapture::yuv420(4, 2);
    let mut pipeline = PipelineBuilder::new(source).tunables(fast_tunables()).build();
    let receiver = pipeline.receiver();
    pipeline.start().unwrap();
    feeder.push(fixture());
    wait_for("delivery", || receiver.is_pending());

    pipeline.stop();
    assert!(receiver.take().is_none());
}

#[derive(Default)]
struct CountingSink {
    allocations: usize,
    updates: usize,
    last: Option<FrameDimensions>,
}

impl TextureSink for CountingSink {
    fn allocate(&mut self, frame: &RgbaFrame) {
        self.allocations += 1;
        self.last = Some(frame.dims());
    }

    fn update(&mut self, frame: &RgbaFrame) {
        self.updates += 1;
        self.last = Some(frame.dims());
    }
}

#[test]
fn virtual_source_reaches_renderer() {
    init_tracing();
    let source = VirtualCapture::new(VirtualCaptureConfig::new(64, 48).with_fps(120));
    let mut pipeline = PipelineBuilder::new(source)
        .processor(EdgeDetector::default())
        .tunables(fast_tunables())
        .build();
    let mut renderer = pipeline.renderer(CountingSink::default());
    pipeline.start().unwrap();

    wait_for("two uploads", || {
        renderer.draw();
        renderer.sink().allocations + renderer.sink().updates >= 2
    });
    pipeline.stop();

    let dims = FrameDimensions::new(64, 48).unwrap();
    assert_eq!(renderer.sink().allocations, 1);
    assert_eq!(renderer.sink().last, Some(dims));
    assert_eq!(renderer.draw(), DrawOutcome::Reused(dims));
    assert!(pipeline.metrics().render.total_samples() >= 2);
    assert!(pipeline.metrics().counters.received() >= 2);
    assert_eq!(pipeline.metrics().counters.failed(), 0);
}
