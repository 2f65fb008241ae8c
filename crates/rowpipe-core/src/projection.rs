//! Declarative stage descriptions produced by the planner.
//!
//! A `Projection` is an immutable value object. The factory in `rowpipe-exec`
//! matches on it exhaustively to build a runnable projector.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::hash::{hash_serde, Hash256};

/// Where a stage runs. Only selects physical variants, never semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowGranularity {
    Doc,
    Shard,
    Node,
    Cluster,
}

/// Phase of a two-step distributed aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateMode {
    /// Raw rows in, final values out.
    IterFinal,
    /// Raw rows in, mergeable partial states out.
    IterPartial,
    /// Partial states in, final values out.
    PartialFinal,
}

impl AggregateMode {
    pub fn consumes_partial(self) -> bool {
        matches!(self, AggregateMode::PartialFinal)
    }

    pub fn produces_final(self) -> bool {
        !matches!(self, AggregateMode::IterPartial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    /// `count(col)`: counts non-null values.
    Count,
    /// `count(*)`: counts rows.
    CountStar,
    Sum,
    Avg,
    Min,
    Max,
    /// Any non-null value of the group (the first one seen).
    Arbitrary,
}

/// One aggregate call.
///
/// `inputs` are column positions of the stage input. In `PartialFinal` mode
/// `inputs[0]` points at the column holding the partial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub kind: AggregateKind,
    pub inputs: Vec<usize>,
}

impl Aggregation {
    pub fn new(kind: AggregateKind, inputs: Vec<usize>) -> Self {
        Self { kind, inputs }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterProjection {
    pub predicate: Expr,
    pub outputs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNProjection {
    /// `None` means no limit.
    pub limit: Option<usize>,
    pub offset: usize,
    pub outputs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedTopNProjection {
    /// `None` means no limit.
    pub limit: Option<usize>,
    pub offset: usize,
    /// Evaluated on the input row after ordering.
    pub outputs: Vec<Expr>,
    /// Input column positions, most significant first.
    pub order_by: Vec<usize>,
    /// `true` means descending for the column at the same position.
    pub reverse_flags: Vec<bool>,
    /// `None` leaves null placement to the default for the direction.
    pub nulls_first: Vec<Option<bool>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationProjection {
    pub aggregations: Vec<Aggregation>,
    pub mode: AggregateMode,
    pub granularity: RowGranularity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProjection {
    pub keys: Vec<usize>,
    pub aggregations: Vec<Aggregation>,
    pub mode: AggregateMode,
    pub granularity: RowGranularity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Filter(FilterProjection),
    TopN(TopNProjection),
    OrderedTopN(OrderedTopNProjection),
    Aggregation(AggregationProjection),
    Group(GroupProjection),
}

impl Projection {
    pub fn name(&self) -> &'static str {
        match self {
            Projection::Filter(_) => "filter",
            Projection::TopN(_) => "topn",
            Projection::OrderedTopN(_) => "ordered_topn",
            Projection::Aggregation(_) => "aggregation",
            Projection::Group(_) => "group",
        }
    }

    /// Stable content hash, used to correlate log lines of one stage.
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(self)
    }

    /// Structural checks the planner is expected to uphold.
    pub fn validate(&self) -> Result<()> {
        match self {
            Projection::OrderedTopN(p) => {
                if p.order_by.is_empty() {
                    return Err(Error::Plan("ordered topn requires order by columns".into()));
                }
                if p.reverse_flags.len() != p.order_by.len() {
                    return Err(Error::Plan(format!(
                        "ordered topn has {} order by columns but {} reverse flags",
                        p.order_by.len(),
                        p.reverse_flags.len()
                    )));
                }
                if p.nulls_first.len() != p.order_by.len() {
                    return Err(Error::Plan(format!(
                        "ordered topn has {} order by columns but {} nulls first flags",
                        p.order_by.len(),
                        p.nulls_first.len()
                    )));
                }
                Ok(())
            }
            Projection::Aggregation(p) => validate_aggregations(&p.aggregations, p.mode),
            Projection::Group(p) => {
                if p.keys.is_empty() {
                    return Err(Error::Plan("group projection requires key columns".into()));
                }
                validate_aggregations(&p.aggregations, p.mode)
            }
            Projection::Filter(_) | Projection::TopN(_) => Ok(()),
        }
    }
}

fn validate_aggregations(aggregations: &[Aggregation], mode: AggregateMode) -> Result<()> {
    for agg in aggregations {
        let needs_input = mode.consumes_partial() || agg.kind != AggregateKind::CountStar;
        if needs_input && agg.inputs.is_empty() {
            return Err(Error::Plan(format!(
                "aggregate {:?} in mode {:?} requires an input column",
                agg.kind, mode
            )));
        }
    }
    Ok(())
}

macro_rules! projection_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Projection {
            fn from(p: $ty) -> Self {
                Projection::$variant(p)
            }
        }
    };
}

projection_from!(FilterProjection, Filter);
projection_from!(TopNProjection, TopN);
projection_from!(OrderedTopNProjection, OrderedTopN);
projection_from!(AggregationProjection, Aggregation);
projection_from!(GroupProjection, Group);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_topn_flag_arity_is_checked() {
        let p = Projection::OrderedTopN(OrderedTopNProjection {
            limit: Some(10),
            offset: 0,
            outputs: Expr::identity(2),
            order_by: vec![0, 1],
            reverse_flags: vec![false],
            nulls_first: vec![None, None],
        });
        assert!(matches!(p.validate(), Err(Error::Plan(_))));
    }

    #[test]
    fn fingerprint_is_stable() {
        let p = Projection::TopN(TopNProjection {
            limit: Some(5),
            offset: 1,
            outputs: Expr::identity(1),
        });
        assert_eq!(p.fingerprint().unwrap(), p.clone().fingerprint().unwrap());
    }
}
