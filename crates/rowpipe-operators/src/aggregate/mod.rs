//! Aggregate functions and their mergeable states.
//!
//! Every function supports three phases: `iterate` folds raw input values,
//! `to_partial` ships the state as a [`Scalar`], and `merge` folds a shipped
//! partial state into a local one. A partial-then-final run over split input
//! produces the same result as a single final run over the whole input.

mod avg;
mod count;
mod extreme;
mod sum;

use rowpipe_core::projection::{AggregateKind, AggregateMode, Aggregation};
use rowpipe_core::row::{OwnedRow, Row};
use rowpipe_core::types::Scalar;

use crate::traits::OpError;

pub use avg::Avg;
pub use count::Count;
pub use extreme::{Arbitrary, Extreme};
pub use sum::Sum;

/// Running numeric total; integers stay exact until a float shows up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn from_scalar(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::I32(_) | Scalar::I64(_) => value.as_i64().map(Numeric::Int),
            Scalar::F32(_) | Scalar::F64(_) => value.as_f64().map(Numeric::Float),
            _ => None,
        }
    }

    pub fn checked_add(self, other: Numeric) -> Result<Numeric, OpError> {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => a
                .checked_add(b)
                .map(Numeric::Int)
                .ok_or_else(|| OpError::Evaluation("bigint out of range in sum".into())),
            (a, b) => Ok(Numeric::Float(a.as_f64() + b.as_f64())),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }

    pub fn into_scalar(self) -> Scalar {
        match self {
            Numeric::Int(v) => Scalar::I64(v),
            Numeric::Float(v) => Scalar::F64(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggState {
    Count(i64),
    Sum(Option<Numeric>),
    Avg { sum: f64, count: i64 },
    Value(Option<Scalar>),
}

pub trait AggregateFunction: Sync {
    fn name(&self) -> &'static str;

    fn init(&self) -> AggState;

    /// Fold one raw input value; `None` when the call has no input column.
    fn iterate(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError>;

    /// Fold a partial state produced by [`AggregateFunction::to_partial`].
    fn merge(&self, state: &mut AggState, partial: &Scalar) -> Result<(), OpError>;

    fn finalize(&self, state: AggState) -> Scalar;

    fn to_partial(&self, state: AggState) -> Scalar;
}

static COUNT: Count = Count { star: false };
static COUNT_STAR: Count = Count { star: true };
static SUM: Sum = Sum;
static AVG: Avg = Avg;
static MIN: Extreme = Extreme { max: false };
static MAX: Extreme = Extreme { max: true };
static ARBITRARY: Arbitrary = Arbitrary;

pub fn resolve(kind: AggregateKind) -> &'static dyn AggregateFunction {
    match kind {
        AggregateKind::Count => &COUNT,
        AggregateKind::CountStar => &COUNT_STAR,
        AggregateKind::Sum => &SUM,
        AggregateKind::Avg => &AVG,
        AggregateKind::Min => &MIN,
        AggregateKind::Max => &MAX,
        AggregateKind::Arbitrary => &ARBITRARY,
    }
}

pub(crate) fn state_mismatch(function: &str, state: &AggState) -> OpError {
    OpError::Invariant(format!("{function} got foreign state {state:?}"))
}

pub(crate) fn bad_partial(function: &str, partial: &Scalar) -> OpError {
    OpError::Evaluation(format!("{function} cannot merge partial state {partial}"))
}

struct BoundAggregate {
    function: &'static dyn AggregateFunction,
    input: Option<usize>,
}

/// The aggregate calls of one stage, bound to their input columns.
pub struct Aggregates {
    bound: Vec<BoundAggregate>,
    mode: AggregateMode,
}

impl Aggregates {
    pub fn new(aggregations: &[Aggregation], mode: AggregateMode) -> Self {
        let bound = aggregations
            .iter()
            .map(|agg| BoundAggregate {
                function: resolve(agg.kind),
                input: agg.inputs.first().copied(),
            })
            .collect();
        Self { bound, mode }
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    pub fn init_states(&self) -> Vec<AggState> {
        self.bound.iter().map(|b| b.function.init()).collect()
    }

    /// Fold `row` into `states`: raw values, or shipped partials in `PartialFinal`.
    pub fn update(&self, states: &mut [AggState], row: &Row) -> Result<(), OpError> {
        for (bound, state) in self.bound.iter().zip(states.iter_mut()) {
            let value = match bound.input {
                Some(idx) => Some(row.get(idx).ok_or_else(|| {
                    OpError::Evaluation(format!(
                        "{} input column {idx} out of bounds for row of arity {}",
                        bound.function.name(),
                        row.len()
                    ))
                })?),
                None => None,
            };
            if self.mode.consumes_partial() {
                let partial = value.ok_or_else(|| {
                    OpError::Invariant(format!("{} has no partial state column", bound.function.name()))
                })?;
                bound.function.merge(state, partial)?;
            } else {
                bound.function.iterate(state, value)?;
            }
        }
        Ok(())
    }

    /// Append one output value per aggregate: final values, or partial states
    /// in `IterPartial`.
    pub fn emit(&self, states: Vec<AggState>, out: &mut OwnedRow) {
        for (bound, state) in self.bound.iter().zip(states) {
            let value = if self.mode.produces_final() {
                bound.function.finalize(state)
            } else {
                bound.function.to_partial(state)
            };
            out.push(value);
        }
    }
}
