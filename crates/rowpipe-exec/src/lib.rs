#![forbid(unsafe_code)]
//! rowpipe-exec: turns projections into running pipelines.
//!
//! - [`ProjectorFactory`] maps each `Projection` to a physical projector.
//! - [`compose`] chains projectors over a source; [`drive`] pulls the chain
//!   into a [`RowConsumer`] while honoring the job's [`KillSwitch`].
//! - [`PipelineRunner`] runs many pipelines concurrently against one shared
//!   circuit breaker and logs a summary per run.

pub mod context;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;

pub use context::{ExecutionContext, KillSwitch};
pub use error::{ExecError, Result};
pub use factory::ProjectorFactory;
pub use metrics::{emit_run_summary, tripped_breaker, Outcome, RunSummary};
pub use pipeline::{compose, drive, CollectingConsumer, RowConsumer};
pub use scheduler::PipelineRunner;
