use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use edgeview_core::metrics::Metrics;
use parking_lot::Mutex;

use crate::config::DEFAULT_METRICS_WINDOW;

/// Rolling timing metrics for a pipeline stage.
///
/// # Example
/// ```rust
/// use edgeview::prelude::StageMetrics;
///
/// let metrics = StageMetrics::default();
/// metrics.record(std::time::Duration::from_millis(5));
/// assert_eq!(metrics.total_samples(), 1);
/// assert_eq!(metrics.last_millis(), Some(5.0));
/// ```
#[derive(Default, Clone)]
pub struct StageMetrics {
    inner: Arc<StageState>,
}

#[derive(Default)]
struct StageState {
    count: AtomicU64,
    last_nanos: AtomicU64,
    window: Mutex<WindowState>,
}

struct WindowState {
    samples: VecDeque<(Instant, u64)>,
    max: usize,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            samples: VecDeque::new(),
            max: DEFAULT_METRICS_WINDOW,
        }
    }
}

impl StageMetrics {
    /// Record a single duration sample.
    pub fn record(&self, dur: Duration) {
        let nanos = dur.as_nanos().min(u64::MAX as u128) as u64;
        self.inner.count.fetch_add(1, Ordering::Relaxed);
        self.inner.last_nanos.store(nanos, Ordering::Relaxed);
        let mut win = self.inner.window.lock();
        win.samples.push_back((Instant::now(), nanos));
        while win.samples.len() > win.max {
            win.samples.pop_front();
        }
    }

    /// Change the window size used for rolling averages/fps. Minimum of 1.
    pub fn set_window_size(&self, window: usize) {
        let mut win = self.inner.window.lock();
        win.max = window.max(1);
        while win.samples.len() > win.max {
            win.samples.pop_front();
        }
    }

    /// Samples within the current window.
    pub fn samples(&self) -> u64 {
        self.inner.window.lock().samples.len() as u64
    }

    /// Total samples recorded over the lifetime.
    pub fn total_samples(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    /// Rolling average of samples in milliseconds.
    pub fn avg_millis(&self) -> Option<f64> {
        let win = self.inner.window.lock();
        let count = win.samples.len();
        if count == 0 {
            return None;
        }
        let total: u128 = win.samples.iter().map(|(_, n)| *n as u128).sum();
        Some(total as f64 / 1_000_000.0 / count as f64)
    }

    /// Most recent sample in milliseconds.
    pub fn last_millis(&self) -> Option<f64> {
        if self.total_samples() == 0 {
            return None;
        }
        Some(self.inner.last_nanos.load(Ordering::Relaxed) as f64 / 1_000_000.0)
    }

    /// Rolling rate of samples per second, from sample timestamps.
    pub fn fps(&self) -> Option<f64> {
        let win = self.inner.window.lock();
        if win.samples.len() < 2 {
            return None;
        }
        let first = win.samples.front()?.0;
        let last = win.samples.back()?.0;
        let span = last.saturating_duration_since(first).as_secs_f64();
        // n samples span n - 1 intervals.
        (span > 0.0).then(|| (win.samples.len() - 1) as f64 / span)
    }
}

/// Metrics for a running pipeline.
///
/// Cloning shares the underlying counters.
#[derive(Clone, Default)]
pub struct PipelineMetrics {
    /// Planar to semiplanar repack timings.
    pub repack: StageMetrics,
    /// YUV to RGBA conversion timings.
    pub convert: StageMetrics,
    /// Successful processor runs.
    pub process: StageMetrics,
    /// Texture uploads by renderers created from the pipeline.
    pub render: StageMetrics,
    /// Frame counters.
    pub counters: Arc<Metrics>,
}

impl PipelineMetrics {
    pub fn with_window(window: usize) -> Self {
        let metrics = Self::default();
        for stage in [
            &metrics.repack,
            &metrics.convert,
            &metrics.process,
            &metrics.render,
        ] {
            stage.set_window_size(window);
        }
        metrics
    }

    /// Converted frames that were replaced before anyone consumed them.
    pub fn dropped(&self) -> u64 {
        self.counters.replaced()
    }
}
