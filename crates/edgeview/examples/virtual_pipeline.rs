use std::time::{Duration, Instant};

use edgeview::prelude::*;

/// Stands in for a GPU texture: keeps the last uploaded frame in memory.
#[derive(Default)]
struct MemoryTexture {
    pixels: Vec<u8>,
    allocations: usize,
}

impl TextureSink for MemoryTexture {
    fn allocate(&mut self, frame: &RgbaFrame) {
        self.allocations += 1;
        self.pixels = frame.as_bytes().to_vec();
    }

    fn update(&mut self, frame: &RgbaFrame) {
        self.pixels.copy_from_slice(frame.as_bytes());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    EdgeviewConfig::new().idle_wait_ms(1).metrics_window(60).apply();

    let source = VirtualCapture::new(
        VirtualCaptureConfig::new(320, 240)
            .with_fps(30)
            .with_layout(ChromaLayout::SemiPlanar)
            .with_row_padding(64),
    );
    let mut pipeline = PipelineBuilder::new(source)
        .processor(EdgeDetector::new(40, 120))
        .build();
    let mut renderer = pipeline.renderer(MemoryTexture::default());
    pipeline.start()?;

    // Draw at ~60 Hz; toggle edge detection halfway through.
    let started = Instant::now();
    let mut toggled = false;
    while started.elapsed() < Duration::from_secs(3) {
        if let DrawOutcome::Uploaded(dims) = renderer.draw() {
            println!("texture allocated at {dims}");
        }
        if !toggled && started.elapsed() > Duration::from_millis(1500) {
            pipeline.set_processing_enabled(false);
            toggled = true;
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    pipeline.stop();

    let metrics = pipeline.metrics();
    println!(
        "repack avg_ms={:.3?} convert avg_ms={:.3?} process avg_ms={:.3?}",
        metrics.repack.avg_millis(),
        metrics.convert.avg_millis(),
        metrics.process.avg_millis(),
    );
    println!(
        "display fps={:.1?} received={} delivered={} dropped={} failed={}",
        renderer.metrics().fps(),
        metrics.counters.received(),
        metrics.counters.delivered(),
        metrics.dropped(),
        metrics.counters.failed(),
    );
    println!(
        "texture allocations={} bytes={}",
        renderer.sink().allocations,
        renderer.sink().pixels.len()
    );
    Ok(())
}
