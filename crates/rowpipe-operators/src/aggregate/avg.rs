use rowpipe_core::types::Scalar;

use super::{bad_partial, state_mismatch, AggState, AggregateFunction};
use crate::traits::OpError;

/// Mean of non-null inputs as double precision.
///
/// The partial state is `[sum: F64, count: I64]` so that merging weighs each
/// side by its row count.
pub struct Avg;

impl AggregateFunction for Avg {
    fn name(&self) -> &'static str {
        "avg"
    }

    fn init(&self) -> AggState {
        AggState::Avg { sum: 0.0, count: 0 }
    }

    fn iterate(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError> {
        let AggState::Avg { sum, count } = state else {
            return Err(state_mismatch(self.name(), state));
        };
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(());
        };
        let x = value.as_f64().ok_or_else(|| {
            OpError::Evaluation(format!("avg expects a number, got {}", value.data_type()))
        })?;
        *sum += x;
        *count += 1;
        Ok(())
    }

    fn merge(&self, state: &mut AggState, partial: &Scalar) -> Result<(), OpError> {
        let AggState::Avg { sum, count } = state else {
            return Err(state_mismatch(self.name(), state));
        };
        let Scalar::Array(parts) = partial else {
            return Err(bad_partial(self.name(), partial));
        };
        let (Some(s), Some(c)) = (
            parts.first().and_then(Scalar::as_f64),
            parts.get(1).and_then(Scalar::as_i64),
        ) else {
            return Err(bad_partial(self.name(), partial));
        };
        *sum += s;
        *count += c;
        Ok(())
    }

    fn finalize(&self, state: AggState) -> Scalar {
        match state {
            AggState::Avg { sum, count } if count > 0 => Scalar::F64(sum / count as f64),
            _ => Scalar::Null,
        }
    }

    fn to_partial(&self, state: AggState) -> Scalar {
        match state {
            AggState::Avg { sum, count } => Scalar::Array(vec![Scalar::F64(sum), Scalar::I64(count)]),
            _ => Scalar::Null,
        }
    }
}
