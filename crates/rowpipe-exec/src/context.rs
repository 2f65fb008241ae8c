//! Per-job execution context and cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

use rowpipe_core::config::EngineConfig;
use rowpipe_core::id::JobId;
use rowpipe_core::projection::RowGranularity;
use rowpipe_mem::{CircuitBreaker, MemoryManager, RamAccounting};
use rowpipe_operators::OpError;

#[derive(Default)]
struct KillState {
    killed: AtomicBool,
    reason: OnceLock<String>,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a job's consumer and whoever
/// may kill it. Killing is sticky; the first reason wins.
#[derive(Clone, Default)]
pub struct KillSwitch {
    state: Arc<KillState>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill(&self, reason: impl Into<String>) {
        let _ = self.state.reason.set(reason.into());
        self.state.killed.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    pub fn is_killed(&self) -> bool {
        self.state.killed.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<&str> {
        if self.is_killed() {
            self.state.reason.get().map(String::as_str)
        } else {
            None
        }
    }

    /// `JobKilled` if the switch has been flipped.
    pub fn check(&self) -> Result<(), OpError> {
        match self.reason() {
            Some(reason) => Err(OpError::JobKilled(reason.to_owned())),
            None => Ok(()),
        }
    }

    /// Resolves once the job is killed.
    pub async fn killed(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent kill is not missed.
            notified.as_mut().enable();
            if self.is_killed() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for KillSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KillSwitch")
            .field("killed", &self.is_killed())
            .field("reason", &self.reason())
            .finish()
    }
}

/// Everything a stage of one job needs besides its projection.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    job_id: JobId,
    ram_accounting: RamAccounting,
    memory_manager: MemoryManager,
    granularity: RowGranularity,
    kill: KillSwitch,
}

impl ExecutionContext {
    pub fn new(
        job_id: JobId,
        breaker: CircuitBreaker,
        quota: Option<usize>,
        granularity: RowGranularity,
    ) -> Self {
        let ram_accounting = RamAccounting::new(job_id, breaker, quota);
        Self {
            job_id,
            memory_manager: MemoryManager::new(ram_accounting.clone()),
            ram_accounting,
            granularity,
            kill: KillSwitch::new(),
        }
    }

    /// New job bound to `breaker`, with the configured per-job quota.
    pub fn for_job(config: &EngineConfig, breaker: CircuitBreaker, granularity: RowGranularity) -> Self {
        Self::new(JobId::random(), breaker, config.job_quota_bytes, granularity)
    }

    /// Context without a memory limit, for tests and tools.
    pub fn unbounded(granularity: RowGranularity) -> Self {
        Self::new(
            JobId::random(),
            CircuitBreaker::unlimited("unbounded"),
            None,
            granularity,
        )
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn ram_accounting(&self) -> &RamAccounting {
        &self.ram_accounting
    }

    pub fn memory_manager(&self) -> &MemoryManager {
        &self.memory_manager
    }

    pub fn granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_reason_wins() {
        let kill = KillSwitch::new();
        assert!(kill.check().is_ok());
        kill.kill("user cancel");
        kill.kill("timeout");
        assert_eq!(kill.reason(), Some("user cancel"));
        assert!(matches!(kill.check(), Err(OpError::JobKilled(r)) if r == "user cancel"));
    }

    #[tokio::test]
    async fn killed_wakes_waiters() {
        let kill = KillSwitch::new();
        let waiter = {
            let kill = kill.clone();
            tokio::spawn(async move { kill.killed().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        kill.kill("stop");
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
