//! Circuit breaker and the per-scope guard that holds its bytes.
//!
//! One breaker instance is shared by every pipeline of the process. The only
//! cross-pipeline mutable state is its atomic byte counter. Dropping a guard
//! returns the bytes to the breaker (panic-safe).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tracking::PeakTracker;

/// Add `bytes` to `counter` unless the result would exceed `cap`.
/// Returns the new value on success.
pub(crate) fn try_add(counter: &AtomicUsize, bytes: usize, cap: usize) -> Option<usize> {
    loop {
        let cur = counter.load(Ordering::Relaxed);
        let next = cur.saturating_add(bytes);
        if next > cap {
            return None;
        }
        if counter
            .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            return Some(next);
        }
    }
}

struct BreakerInner {
    name: String,
    capacity: usize,
    used: AtomicUsize,
    trips: AtomicU64,
    peak: PeakTracker,
}

impl BreakerInner {
    fn try_acquire(&self, bytes: usize) -> bool {
        match try_add(&self.used, bytes, self.capacity) {
            Some(used) => {
                self.peak.record_used(used);
                true
            }
            None => false,
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn trip(&self, label: &'static str, requested: usize) -> Error {
        self.trips.fetch_add(1, Ordering::Relaxed);
        let used = self.used.load(Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        tracing::warn!(
            breaker = %self.name,
            label,
            requested,
            limit = self.capacity,
            used,
            "circuit breaker tripped"
        );
        Error::CircuitBreaking {
            breaker: self.name.clone(),
            label,
            requested,
            limit: self.capacity,
            used,
        }
    }
}

/// Shared byte ceiling.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, limit_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BreakerInner {
                name: name.into(),
                capacity: limit_bytes,
                used: AtomicUsize::new(0),
                trips: AtomicU64::new(0),
                peak: PeakTracker::new(),
            }),
        }
    }

    /// Breaker that never trips; tests and trusted internal jobs use it.
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self::new(name, usize::MAX)
    }

    /// Guard holding zero bytes, grown by its scope.
    pub(crate) fn empty_guard(&self, label: &'static str) -> BreakerGuard {
        BreakerGuard {
            inner: Arc::clone(&self.inner),
            bytes: 0,
            label,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn limit_bytes(&self) -> usize {
        self.inner.capacity
    }

    /// Current usage (advisory).
    pub fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    /// How many reservations were refused since creation.
    pub fn trip_count(&self) -> u64 {
        self.inner.trips.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.inner.peak.peak()
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("limit", &self.inner.capacity)
            .field("used", &self.used_bytes())
            .finish()
    }
}

/// Bytes one accounting scope holds against the breaker. Dropping it hands
/// them back.
pub struct BreakerGuard {
    inner: Arc<BreakerInner>,
    bytes: usize,
    label: &'static str,
}

impl BreakerGuard {
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Grow by `additional` bytes or trip the breaker. A refused request
    /// leaves the guard unchanged.
    pub fn grow(&mut self, additional: usize) -> Result<()> {
        if additional == 0 {
            return Ok(());
        }
        if !self.inner.try_acquire(additional) {
            return Err(self.inner.trip(self.label, additional));
        }
        self.bytes += additional;
        Ok(())
    }

    /// Hand back up to `bytes`; returns how many were actually released.
    pub fn shrink(&mut self, bytes: usize) -> usize {
        let bytes = bytes.min(self.bytes);
        if bytes > 0 {
            self.inner.release(bytes);
            self.bytes -= bytes;
        }
        bytes
    }
}

impl Drop for BreakerGuard {
    fn drop(&mut self) {
        self.shrink(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_growth_trips_and_keeps_guard() {
        let breaker = CircuitBreaker::new("query", 100);
        let mut guard = breaker.empty_guard("sort");
        guard.grow(60).unwrap();

        let err = guard.grow(50).unwrap_err();
        assert!(matches!(err, Error::CircuitBreaking { requested: 50, used: 60, .. }));
        assert_eq!(guard.bytes(), 60);
        assert_eq!(breaker.trip_count(), 1);

        assert_eq!(guard.shrink(100), 60);
        assert_eq!(breaker.used_bytes(), 0);
        assert_eq!(breaker.peak_bytes(), 60);
    }
}
