use rowpipe_core::types::Scalar;

use super::{bad_partial, state_mismatch, AggState, AggregateFunction};
use crate::traits::OpError;

/// `count(col)` counts non-null values; `count(*)` counts rows.
pub struct Count {
    pub(crate) star: bool,
}

impl AggregateFunction for Count {
    fn name(&self) -> &'static str {
        if self.star {
            "count(*)"
        } else {
            "count"
        }
    }

    fn init(&self) -> AggState {
        AggState::Count(0)
    }

    fn iterate(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError> {
        let AggState::Count(n) = state else {
            return Err(state_mismatch(self.name(), state));
        };
        if self.star || value.is_some_and(|v| !v.is_null()) {
            *n += 1;
        }
        Ok(())
    }

    fn merge(&self, state: &mut AggState, partial: &Scalar) -> Result<(), OpError> {
        let AggState::Count(n) = state else {
            return Err(state_mismatch(self.name(), state));
        };
        *n += partial.as_i64().ok_or_else(|| bad_partial(self.name(), partial))?;
        Ok(())
    }

    fn finalize(&self, state: AggState) -> Scalar {
        self.to_partial(state)
    }

    fn to_partial(&self, state: AggState) -> Scalar {
        match state {
            AggState::Count(n) => Scalar::I64(n),
            _ => Scalar::Null,
        }
    }
}
