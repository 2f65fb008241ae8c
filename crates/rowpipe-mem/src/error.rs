use thiserror::Error;

use rowpipe_core::id::JobId;

/// Result type local to rowpipe-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(
        "circuit breaker '{breaker}' tripped for '{label}': requested {requested} bytes, limit {limit}, used {used}"
    )]
    CircuitBreaking {
        breaker: String,
        label: &'static str,
        requested: usize,
        limit: usize,
        used: usize,
    },

    #[error("job {job} exceeded its quota for '{label}': requested {requested} bytes, quota {quota}, used {used}")]
    QuotaExceeded {
        job: JobId,
        label: &'static str,
        requested: usize,
        quota: usize,
        used: usize,
    },
}
