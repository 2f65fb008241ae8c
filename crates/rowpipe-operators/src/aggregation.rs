//! Global aggregation: many rows in, exactly one row out.
//!
//! State is one slot per aggregate call and does not grow with the input, so
//! nothing is accounted here.

use rowpipe_core::projection::{AggregateMode, Aggregation};
use rowpipe_core::row::{OwnedRow, Row};

use crate::aggregate::{AggState, Aggregates};
use crate::collect::{CollectingBatchIterator, Collector};
use crate::traits::{BoxedBatchIterator, OpError};

pub struct AggregationProjector {
    aggregations: Vec<Aggregation>,
    mode: AggregateMode,
}

impl AggregationProjector {
    pub fn new(aggregations: Vec<Aggregation>, mode: AggregateMode) -> Self {
        Self { aggregations, mode }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        let aggregates = Aggregates::new(&self.aggregations, self.mode);
        let states = aggregates.init_states();
        Box::new(CollectingBatchIterator::new(
            source,
            AggregationCollector { aggregates, states },
        ))
    }
}

pub struct AggregationCollector {
    aggregates: Aggregates,
    states: Vec<AggState>,
}

impl Collector for AggregationCollector {
    fn name(&self) -> &'static str {
        "aggregation"
    }

    fn accumulate(&mut self, row: &Row) -> Result<(), OpError> {
        self.aggregates.update(&mut self.states, row)
    }

    fn finish(&mut self) -> Result<Vec<OwnedRow>, OpError> {
        let states = std::mem::replace(&mut self.states, self.aggregates.init_states());
        let mut row = Vec::with_capacity(self.aggregates.len());
        self.aggregates.emit(states, &mut row);
        Ok(vec![row])
    }

    fn release(&mut self) {
        self.states.clear();
    }
}
