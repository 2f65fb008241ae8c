//! Projection → projector.
//!
//! One exhaustive `match` over [`Projection`]. Strategy choices:
//! - ordered top-N without a limit sorts everything;
//! - ordered top-N with a limit keeps a bounded heap of `limit + offset` rows;
//! - unordered top-N streams and stops at the limit.

use rowpipe_core::projection::Projection;
use rowpipe_operators::sort::OrderBy;
use rowpipe_operators::{
    AggregationProjector, FilterProjector, Footprint, GroupingProjector, Projector,
    SimpleTopNProjector, SortingProjector, SortingTopNProjector,
};

use crate::context::ExecutionContext;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectorFactory {
    footprint: Footprint,
}

impl ProjectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-row and per-group overhead used for accounting.
    pub fn with_footprint(footprint: Footprint) -> Self {
        Self { footprint }
    }

    pub fn create(&self, projection: &Projection, ctx: &ExecutionContext) -> Result<Projector> {
        projection.validate()?;
        let memory = ctx.memory_manager().clone();

        let projector = match projection {
            Projection::Filter(p) => Projector::Filter(FilterProjector::new(
                p.predicate.clone(),
                p.outputs.clone(),
                memory,
            )),
            Projection::TopN(p) => Projector::SimpleTopN(SimpleTopNProjector::new(
                p.limit,
                p.offset,
                p.outputs.clone(),
                memory,
            )),
            Projection::OrderedTopN(p) => {
                let order = OrderBy::new(&p.order_by, &p.reverse_flags, &p.nulls_first);
                match p.limit {
                    Some(limit) => Projector::SortingTopN(SortingTopNProjector::new(
                        order,
                        limit,
                        p.offset,
                        p.outputs.clone(),
                        memory,
                        self.footprint,
                    )),
                    None => Projector::Sorting(SortingProjector::new(
                        order,
                        p.offset,
                        p.outputs.clone(),
                        memory,
                        self.footprint,
                    )),
                }
            }
            Projection::Aggregation(p) => {
                Projector::Aggregation(AggregationProjector::new(p.aggregations.clone(), p.mode))
            }
            Projection::Group(p) => Projector::Grouping(GroupingProjector::new(
                p.keys.clone(),
                p.aggregations.clone(),
                p.mode,
                ctx.ram_accounting().clone(),
                self.footprint,
            )),
        };

        let fingerprint = projection.fingerprint()?;
        tracing::debug!(
            job = %ctx.job_id(),
            granularity = ?ctx.granularity(),
            projection = projection.name(),
            projector = projector.name(),
            fingerprint = %fingerprint.short(),
            "built projector"
        );
        Ok(projector)
    }

    /// Build one projector per projection, in order.
    pub fn create_all(&self, projections: &[Projection], ctx: &ExecutionContext) -> Result<Vec<Projector>> {
        projections.iter().map(|p| self.create(p, ctx)).collect()
    }
}
