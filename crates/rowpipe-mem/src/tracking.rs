//! High-water mark of accounted bytes, per breaker and per job.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct PeakTracker {
    peak_bytes: AtomicUsize,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the usage after a successful reservation.
    pub fn record_used(&self, used_bytes: usize) {
        let previous = self.peak_bytes.fetch_max(used_bytes, Ordering::AcqRel);
        #[cfg(feature = "tracing")]
        {
            if used_bytes > previous {
                tracing::trace!(used_bytes, previous_peak = previous, "new memory peak");
            }
        }
        #[cfg(not(feature = "tracing"))]
        let _ = previous;
    }

    pub fn peak(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }
}
