use rowpipe_core::types::Scalar;

use super::{bad_partial, state_mismatch, AggState, AggregateFunction, Numeric};
use crate::traits::OpError;

/// Integer inputs sum exactly as bigint and fail on overflow; any float
/// input turns the sum into double precision. No non-null input yields null.
pub struct Sum;

impl Sum {
    fn add(&self, state: &mut AggState, value: &Scalar) -> Result<(), OpError> {
        let AggState::Sum(total) = state else {
            return Err(state_mismatch(self.name(), state));
        };
        if value.is_null() {
            return Ok(());
        }
        let value = Numeric::from_scalar(value).ok_or_else(|| {
            OpError::Evaluation(format!("sum expects a number, got {}", value.data_type()))
        })?;
        *total = Some(match *total {
            Some(t) => t.checked_add(value)?,
            None => value,
        });
        Ok(())
    }
}

impl AggregateFunction for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn init(&self) -> AggState {
        AggState::Sum(None)
    }

    fn iterate(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError> {
        match value {
            Some(v) => self.add(state, v),
            None => Err(OpError::Invariant("sum requires an input column".into())),
        }
    }

    fn merge(&self, state: &mut AggState, partial: &Scalar) -> Result<(), OpError> {
        if !partial.is_null() && Numeric::from_scalar(partial).is_none() {
            return Err(bad_partial(self.name(), partial));
        }
        self.add(state, partial)
    }

    fn finalize(&self, state: AggState) -> Scalar {
        self.to_partial(state)
    }

    fn to_partial(&self, state: AggState) -> Scalar {
        match state {
            AggState::Sum(Some(total)) => total.into_scalar(),
            _ => Scalar::Null,
        }
    }
}
