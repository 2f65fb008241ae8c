//! Run summaries.
//!
//! Emitted through `tracing`; wire a subscriber (or OpenTelemetry layer) in
//! the binary embedding the engine.

use std::time::Duration;

use serde::Serialize;

use rowpipe_core::id::JobId;
use rowpipe_operators::OpError;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job_id: JobId,
    pub stages: usize,
    pub rows: usize,
    pub peak_bytes: usize,
    /// Whether this job itself was refused by the breaker.
    pub breaker_tripped: bool,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Failed,
    Killed,
}

impl Outcome {
    pub fn of<T>(result: &Result<T, OpError>) -> Self {
        match result {
            Ok(_) => Outcome::Completed,
            Err(OpError::JobKilled(_)) => Outcome::Killed,
            Err(_) => Outcome::Failed,
        }
    }
}

/// True when the job itself was refused by the breaker.
pub fn tripped_breaker<T>(result: &Result<T, OpError>) -> bool {
    matches!(
        result,
        Err(OpError::Memory(rowpipe_mem::Error::CircuitBreaking { .. }))
    )
}

pub fn emit_run_summary(summary: &RunSummary) {
    match summary.outcome {
        Outcome::Completed => tracing::info!(
            job = %summary.job_id,
            stages = summary.stages,
            rows = summary.rows,
            peak_bytes = summary.peak_bytes,
            breaker_tripped = summary.breaker_tripped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline finished"
        ),
        outcome => tracing::warn!(
            job = %summary.job_id,
            stages = summary.stages,
            peak_bytes = summary.peak_bytes,
            breaker_tripped = summary.breaker_tripped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            outcome = ?outcome,
            "pipeline aborted"
        ),
    }
}
