use std::sync::atomic::{AtomicU64, Ordering};

/// Frame counters shared between the capture callback, the worker and readers.
///
/// # Example
/// ```rust
/// use edgeview_core::metrics::Metrics;
///
/// let metrics = Metrics::default();
/// metrics.inc_received();
/// metrics.inc_delivered();
/// assert_eq!(metrics.received(), 1);
/// assert_eq!(metrics.delivered(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Metrics {
    received: AtomicU64,
    delivered: AtomicU64,
    replaced: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    passthrough: AtomicU64,
}

impl Metrics {
    /// Frame pulled off the source channel.
    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Converted frame published to the output slot.
    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Published frame displaced an unconsumed one.
    pub fn inc_replaced(&self) {
        self.replaced.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame dropped because its format is not accepted.
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame dropped because conversion failed.
    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Processor failed and the unprocessed frame was delivered instead.
    pub fn inc_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn replaced(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn passthrough(&self) -> u64 {
        self.passthrough.load(Ordering::Relaxed)
    }
}

impl Clone for Metrics {
    fn clone(&self) -> Self {
        let cloned = Metrics::default();
        cloned.received.store(self.received(), Ordering::Relaxed);
        cloned.delivered.store(self.delivered(), Ordering::Relaxed);
        cloned.replaced.store(self.replaced(), Ordering::Relaxed);
        cloned.rejected.store(self.rejected(), Ordering::Relaxed);
        cloned.failed.store(self.failed(), Ordering::Relaxed);
        cloned
            .passthrough
            .store(self.passthrough(), Ordering::Relaxed);
        cloned
    }
}
