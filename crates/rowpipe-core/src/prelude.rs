//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::expr::{CompareOp, Expr, ScalarFunction};
pub use crate::id::JobId;
pub use crate::projection::{
    AggregateKind, AggregateMode, Aggregation, AggregationProjection, FilterProjection,
    GroupProjection, OrderedTopNProjection, Projection, RowGranularity, TopNProjection,
};
pub use crate::row::{Bucket, OwnedRow, Row};
pub use crate::schema::DataType;
pub use crate::types::Scalar;
