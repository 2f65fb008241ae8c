//! Concurrent pipeline execution.
//!
//! [`PipelineRunner`] owns the process-wide circuit breaker and bounds the
//! number of pipelines running at once with a semaphore. Pipelines share
//! nothing else; each one is pulled by its own consumer on a tokio task.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use rowpipe_core::config::EngineConfig;
use rowpipe_core::projection::{Projection, RowGranularity};
use rowpipe_core::row::{Bucket, OwnedRow};
use rowpipe_mem::CircuitBreaker;
use rowpipe_operators::{channel, BatchSender, BoxedBatchIterator, ChannelBatchIterator, InMemoryBatchIterator};

use crate::context::ExecutionContext;
use crate::error::{ExecError, Result};
use crate::factory::ProjectorFactory;
use crate::metrics::{emit_run_summary, tripped_breaker, Outcome, RunSummary};
use crate::pipeline::{compose, drive, CollectingConsumer};

struct RunnerInner {
    config: EngineConfig,
    breaker: CircuitBreaker,
    factory: ProjectorFactory,
    permits: Semaphore,
}

#[derive(Clone)]
pub struct PipelineRunner {
    inner: Arc<RunnerInner>,
}

impl PipelineRunner {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(config.breaker_name.clone(), config.breaker_limit_bytes);
        Ok(Self {
            inner: Arc::new(RunnerInner {
                permits: Semaphore::new(config.max_parallel_tasks),
                factory: ProjectorFactory::new(),
                breaker,
                config,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    /// Fresh job context bound to this runner's breaker.
    pub fn context(&self, granularity: RowGranularity) -> ExecutionContext {
        ExecutionContext::for_job(&self.inner.config, self.inner.breaker.clone(), granularity)
    }

    /// In-memory source paged by `source_batch_size`.
    pub fn in_memory_source(&self, rows: Vec<OwnedRow>) -> BoxedBatchIterator {
        Box::new(InMemoryBatchIterator::batched(rows, self.inner.config.source_batch_size))
    }

    /// Channel source buffering `channel_capacity` batches.
    pub fn channel_source(&self) -> (BatchSender, ChannelBatchIterator) {
        channel(self.inner.config.channel_capacity)
    }

    /// Build, run and collect one pipeline. Waits for a free slot first.
    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        mut source: BoxedBatchIterator,
        projections: &[Projection],
    ) -> Result<Bucket> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|e| ExecError::Join(e.to_string()))?;

        let projectors = match self.inner.factory.create_all(projections, ctx) {
            Ok(projectors) => projectors,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        let started = Instant::now();
        tracing::info!(job = %ctx.job_id(), stages = projectors.len(), "pipeline started");

        let it = compose(source, projectors);
        let result = drive(it, CollectingConsumer::new(ctx), ctx.kill_switch()).await;

        emit_run_summary(&RunSummary {
            job_id: ctx.job_id(),
            stages: projections.len(),
            rows: result.as_ref().map_or(0, Bucket::len),
            peak_bytes: ctx.ram_accounting().peak_bytes(),
            breaker_tripped: tripped_breaker(&result),
            elapsed: started.elapsed(),
            outcome: Outcome::of(&result),
        });
        Ok(result?)
    }

    /// Run a pipeline on its own tokio task.
    pub fn spawn(
        &self,
        ctx: ExecutionContext,
        source: BoxedBatchIterator,
        projections: Vec<Projection>,
    ) -> JoinHandle<Result<Bucket>> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(&ctx, source, &projections).await })
    }

    /// Run every pipeline concurrently and return results in input order.
    pub async fn run_all(
        &self,
        jobs: Vec<(ExecutionContext, BoxedBatchIterator, Vec<Projection>)>,
    ) -> Vec<Result<Bucket>> {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(ctx, source, projections)| self.spawn(ctx, source, projections))
            .collect();
        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.map_err(ExecError::from).and_then(|r| r))
            .collect()
    }
}
