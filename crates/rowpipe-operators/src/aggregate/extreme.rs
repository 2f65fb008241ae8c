use std::cmp::Ordering;

use rowpipe_core::types::{compare_values, Scalar};

use super::{state_mismatch, AggState, AggregateFunction};
use crate::traits::OpError;

/// `min` / `max` over non-null inputs. Partial state is the value itself.
pub struct Extreme {
    pub(crate) max: bool,
}

impl Extreme {
    fn fold(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError> {
        let AggState::Value(best) = state else {
            return Err(state_mismatch(self.name(), state));
        };
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(());
        };
        let wanted = if self.max {
            Ordering::Greater
        } else {
            Ordering::Less
        };
        let replace = match best {
            Some(current) => compare_values(value, current) == wanted,
            None => true,
        };
        if replace {
            *best = Some(value.clone());
        }
        Ok(())
    }
}

impl AggregateFunction for Extreme {
    fn name(&self) -> &'static str {
        if self.max {
            "max"
        } else {
            "min"
        }
    }

    fn init(&self) -> AggState {
        AggState::Value(None)
    }

    fn iterate(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError> {
        self.fold(state, value)
    }

    fn merge(&self, state: &mut AggState, partial: &Scalar) -> Result<(), OpError> {
        self.fold(state, Some(partial))
    }

    fn finalize(&self, state: AggState) -> Scalar {
        self.to_partial(state)
    }

    fn to_partial(&self, state: AggState) -> Scalar {
        match state {
            AggState::Value(Some(v)) => v,
            _ => Scalar::Null,
        }
    }
}

/// First non-null value seen.
pub struct Arbitrary;

impl AggregateFunction for Arbitrary {
    fn name(&self) -> &'static str {
        "arbitrary"
    }

    fn init(&self) -> AggState {
        AggState::Value(None)
    }

    fn iterate(&self, state: &mut AggState, value: Option<&Scalar>) -> Result<(), OpError> {
        let AggState::Value(slot) = state else {
            return Err(state_mismatch(self.name(), state));
        };
        if slot.is_none() {
            *slot = value.filter(|v| !v.is_null()).cloned();
        }
        Ok(())
    }

    fn merge(&self, state: &mut AggState, partial: &Scalar) -> Result<(), OpError> {
        self.iterate(state, Some(partial))
    }

    fn finalize(&self, state: AggState) -> Scalar {
        self.to_partial(state)
    }

    fn to_partial(&self, state: AggState) -> Scalar {
        match state {
            AggState::Value(Some(v)) => v,
            _ => Scalar::Null,
        }
    }
}
