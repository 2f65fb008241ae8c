//! Runnable stage, built from a `Projection` by the executor's factory.

use crate::aggregation::AggregationProjector;
use crate::filter::FilterProjector;
use crate::grouping::GroupingProjector;
use crate::sort::{SortingProjector, SortingTopNProjector};
use crate::topn::SimpleTopNProjector;
use crate::traits::BoxedBatchIterator;

/// One physical strategy per variant. `apply` consumes the projector: a
/// projector wraps exactly one source.
pub enum Projector {
    Filter(FilterProjector),
    SimpleTopN(SimpleTopNProjector),
    Sorting(SortingProjector),
    SortingTopN(SortingTopNProjector),
    Aggregation(AggregationProjector),
    Grouping(GroupingProjector),
}

impl Projector {
    pub fn name(&self) -> &'static str {
        match self {
            Projector::Filter(_) => "filter",
            Projector::SimpleTopN(_) => "simple_topn",
            Projector::Sorting(_) => "sorting",
            Projector::SortingTopN(_) => "sorting_topn",
            Projector::Aggregation(_) => "aggregation",
            Projector::Grouping(_) => "grouping",
        }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        match self {
            Projector::Filter(p) => p.apply(source),
            Projector::SimpleTopN(p) => p.apply(source),
            Projector::Sorting(p) => p.apply(source),
            Projector::SortingTopN(p) => p.apply(source),
            Projector::Aggregation(p) => p.apply(source),
            Projector::Grouping(p) => p.apply(source),
        }
    }
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
