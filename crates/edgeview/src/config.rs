use std::sync::OnceLock;

use edgeview_core::prelude::ChromaOrder;
use parking_lot::Mutex;

/// Default worker sleep when no frame is pending (milliseconds).
pub const DEFAULT_IDLE_WAIT_MS: u64 = 2;
/// Longest idle sleep accepted; keeps stop latency bounded.
pub const MAX_IDLE_WAIT_MS: u64 = 100;
/// Default rolling window for stage timings (samples).
pub const DEFAULT_METRICS_WINDOW: usize = 120;

/// Tunables for the conversion worker.
///
/// # Example
/// ```rust
/// use edgeview::prelude::*;
///
/// let tunables = PipelineTunables {
///     idle_wait_ms: 1,
///     processing_enabled: false,
///     ..PipelineTunables::default()
/// };
/// assert_eq!(tunables.chroma_order, ChromaOrder::Ba);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineTunables {
    /// Sleep between polls of an empty source channel; 0 yields instead.
    pub idle_wait_ms: u64,
    /// Whether an attached processor runs when the pipeline starts.
    pub processing_enabled: bool,
    /// Byte order of chroma pairs in the repacked buffer.
    pub chroma_order: ChromaOrder,
    /// Samples kept by each stage's rolling timing window.
    pub metrics_window: usize,
}

impl Default for PipelineTunables {
    fn default() -> Self {
        Self {
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
            processing_enabled: true,
            chroma_order: ChromaOrder::default(),
            metrics_window: DEFAULT_METRICS_WINDOW,
        }
    }
}

impl PipelineTunables {
    pub(crate) fn sanitized(self) -> Self {
        Self {
            idle_wait_ms: self.idle_wait_ms.min(MAX_IDLE_WAIT_MS),
            metrics_window: self.metrics_window.max(1),
            ..self
        }
    }
}

static PIPELINE_TUNABLES: OnceLock<Mutex<PipelineTunables>> = OnceLock::new();

/// Override pipeline tunables process-wide.
///
/// Pipelines built afterwards pick these up unless given their own.
pub fn set_pipeline_tunables(tunables: PipelineTunables) {
    let lock = PIPELINE_TUNABLES.get_or_init(|| Mutex::new(PipelineTunables::default()));
    *lock.lock() = tunables.sanitized();
}

/// Current process-wide pipeline tunables.
pub fn pipeline_tunables() -> PipelineTunables {
    PIPELINE_TUNABLES
        .get()
        .map(|lock| *lock.lock())
        .unwrap_or_default()
}

/// Builder for process-wide edgeview tunables.
///
/// # Example
/// ```rust,no_run
/// use edgeview::prelude::*;
///
/// EdgeviewConfig::new()
///     .idle_wait_ms(1)
///     .processing_enabled(true)
///     .metrics_window(60)
///     .apply();
/// ```
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EdgeviewConfig {
    pipeline: PipelineTunables,
}

impl EdgeviewConfig {
    /// Start building a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle_wait_ms(mut self, ms: u64) -> Self {
        self.pipeline.idle_wait_ms = ms;
        self
    }

    pub fn processing_enabled(mut self, enabled: bool) -> Self {
        self.pipeline.processing_enabled = enabled;
        self
    }

    pub fn chroma_order(mut self, order: ChromaOrder) -> Self {
        self.pipeline.chroma_order = order;
        self
    }

    pub fn metrics_window(mut self, window: usize) -> Self {
        self.pipeline.metrics_window = window;
        self
    }

    /// Tunables this configuration would install, after sanitizing.
    pub fn pipeline(&self) -> PipelineTunables {
        self.pipeline.sanitized()
    }

    /// Apply the configuration to global tunables.
    pub fn apply(self) {
        set_pipeline_tunables(self.pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps() {
        let t = EdgeviewConfig::new()
            .idle_wait_ms(10_000)
            .metrics_window(0)
            .pipeline();
        assert_eq!(t.idle_wait_ms, MAX_IDLE_WAIT_MS);
        assert_eq!(t.metrics_window, 1);
    }

    #[test]
    fn apply_installs_global_defaults() {
        EdgeviewConfig::new()
            .chroma_order(ChromaOrder::Ab)
            .processing_enabled(false)
            .apply();
        let t = pipeline_tunables();
        assert_eq!(t.chroma_order, ChromaOrder::Ab);
        assert!(!t.processing_enabled);
        set_pipeline_tunables(PipelineTunables::default());
    }
}
