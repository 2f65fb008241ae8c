//! Per-job RAM accounting.
//!
//! A [`RamAccounting`] handle is created once per job and shared by every
//! stage of its pipeline. Each buffering operator opens its own
//! [`AccountingScope`]; growing a scope checks the job quota first and the
//! shared breaker second. A scope gives back everything it holds when it is
//! released or dropped, so a closed or failed operator always returns the
//! job to its baseline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rowpipe_core::id::JobId;

use crate::breaker::{try_add, BreakerGuard, CircuitBreaker};
use crate::error::{Error, Result};
use crate::tracking::PeakTracker;

struct JobAccount {
    job_id: JobId,
    breaker: CircuitBreaker,
    quota: Option<usize>,
    used: AtomicUsize,
    peak: PeakTracker,
}

impl JobAccount {
    fn reserve(&self, bytes: usize, label: &'static str) -> Result<()> {
        let used = match self.quota {
            Some(quota) => try_add(&self.used, bytes, quota).ok_or_else(|| {
                Error::QuotaExceeded {
                    job: self.job_id,
                    label,
                    requested: bytes,
                    quota,
                    used: self.used.load(Ordering::Relaxed),
                }
            })?,
            None => self.used.fetch_add(bytes, Ordering::AcqRel) + bytes,
        };
        self.peak.record_used(used);
        Ok(())
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Scoped byte counter of one job, bound to a shared breaker.
#[derive(Clone)]
pub struct RamAccounting {
    account: Arc<JobAccount>,
}

impl RamAccounting {
    pub fn new(job_id: JobId, breaker: CircuitBreaker, quota: Option<usize>) -> Self {
        Self {
            account: Arc::new(JobAccount {
                job_id,
                breaker,
                quota,
                used: AtomicUsize::new(0),
                peak: PeakTracker::new(),
            }),
        }
    }

    /// Accounting that never refuses; still tracks usage.
    pub fn no_accounting() -> Self {
        Self::new(JobId::random(), CircuitBreaker::unlimited("none"), None)
    }

    /// Open a reservation owned by one operator.
    pub fn scope(&self, label: &'static str) -> AccountingScope {
        AccountingScope {
            guard: self.account.breaker.empty_guard(label),
            account: Arc::clone(&self.account),
            label,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.account.job_id
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.account.breaker
    }

    pub fn quota(&self) -> Option<usize> {
        self.account.quota
    }

    /// Bytes currently held by all open scopes of this job.
    pub fn total_bytes(&self) -> usize {
        self.account.used.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.account.peak.peak()
    }
}

impl std::fmt::Debug for RamAccounting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamAccounting")
            .field("job_id", &self.account.job_id)
            .field("quota", &self.account.quota)
            .field("used", &self.total_bytes())
            .finish()
    }
}

/// Bytes held by one operator. Released on [`AccountingScope::release`] or drop.
pub struct AccountingScope {
    account: Arc<JobAccount>,
    guard: BreakerGuard,
    label: &'static str,
}

impl AccountingScope {
    /// Account `bytes` more before allocating them.
    ///
    /// On failure nothing is held for this request: neither the job counter
    /// nor the breaker changes.
    pub fn add_bytes(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.account.reserve(bytes, self.label)?;
        if let Err(e) = self.guard.grow(bytes) {
            self.account.release(bytes);
            return Err(e);
        }
        Ok(())
    }

    /// Give back up to `bytes`, e.g. after evicting a buffered row.
    pub fn release_bytes(&mut self, bytes: usize) {
        let released = self.guard.shrink(bytes);
        if released > 0 {
            self.account.release(released);
        }
    }

    /// Give back everything. Idempotent.
    pub fn release(&mut self) {
        let held = self.guard.bytes();
        self.release_bytes(held);
    }

    pub fn bytes(&self) -> usize {
        self.guard.bytes()
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for AccountingScope {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_checked_before_breaker() {
        let breaker = CircuitBreaker::new("query", 1_000);
        let ram = RamAccounting::new(JobId::random(), breaker.clone(), Some(100));
        let mut scope = ram.scope("test");

        scope.add_bytes(80).unwrap();
        let err = scope.add_bytes(40).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { quota: 100, used: 80, .. }));
        assert_eq!(breaker.trip_count(), 0);
        assert_eq!(ram.total_bytes(), 80);
        assert_eq!(breaker.used_bytes(), 80);
    }

    #[test]
    fn failed_breaker_growth_rolls_back_job_counter() {
        let breaker = CircuitBreaker::new("query", 50);
        let ram = RamAccounting::new(JobId::random(), breaker.clone(), None);
        let mut scope = ram.scope("test");

        let err = scope.add_bytes(51).unwrap_err();
        assert!(matches!(err, Error::CircuitBreaking { limit: 50, .. }));
        assert_eq!(ram.total_bytes(), 0);
        assert_eq!(breaker.used_bytes(), 0);
        assert_eq!(breaker.trip_count(), 1);
    }

    #[test]
    fn dropping_scope_returns_to_baseline() {
        let breaker = CircuitBreaker::new("query", 1_000);
        let ram = RamAccounting::new(JobId::random(), breaker.clone(), None);
        {
            let mut a = ram.scope("a");
            let mut b = ram.scope("b");
            a.add_bytes(100).unwrap();
            b.add_bytes(200).unwrap();
            b.release_bytes(50);
            assert_eq!(ram.total_bytes(), 250);
            assert_eq!(breaker.used_bytes(), 250);
        }
        assert_eq!(ram.total_bytes(), 0);
        assert_eq!(breaker.used_bytes(), 0);
        assert_eq!(ram.peak_bytes(), 300);
    }
}
