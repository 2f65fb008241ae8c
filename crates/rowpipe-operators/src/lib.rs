#![forbid(unsafe_code)]
//! rowpipe-operators: pull-based row operators.
//!
//! Design intent:
//! - Every operator is a `BatchIterator` wrapping another `BatchIterator`.
//! - Operators never block; when the source needs more data they return
//!   `false` from `move_next` and delegate `load_next_batch` to it.
//! - Anything buffered beyond the current row MUST be accounted through a
//!   `rowpipe_mem::AccountingScope` before it is allocated.

pub mod aggregate;
pub mod aggregation;
pub mod collect;
pub mod expr;
pub mod filter;
pub mod grouping;
pub mod plan;
pub mod projector;
pub mod sort;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod topn;
pub mod traits;

pub use aggregate::{resolve, AggState, AggregateFunction, Aggregates};
pub use aggregation::AggregationProjector;
pub use collect::{CollectingBatchIterator, Collector};
pub use expr::{Evaluator, OutputProjection};
pub use filter::FilterProjector;
pub use grouping::{GroupKey, GroupingProjector};
pub use plan::Footprint;
pub use projector::Projector;
pub use sort::{OrderBy, SortingProjector, SortingTopNProjector};
pub use topn::SimpleTopNProjector;
pub use source::{channel, BatchSender, ChannelBatchIterator, InMemoryBatchIterator};
pub use traits::{BatchIterator, BoxedBatchIterator, IteratorState, OpError};
