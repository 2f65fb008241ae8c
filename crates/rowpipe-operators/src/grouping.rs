//! Hash grouping: one output row per distinct key, `[keys.., aggregates..]`.
//!
//! Keys compare with grouping equality (`NULL` is its own group, floats by
//! canonical bits). Groups are emitted in first-seen order. Every new group
//! is accounted before it is inserted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rowpipe_core::projection::{AggregateMode, Aggregation};
use rowpipe_core::row::{OwnedRow, Row};
use rowpipe_core::types::Scalar;
use rowpipe_mem::{AccountingScope, RamAccounting};

use crate::aggregate::{AggState, Aggregates};
use crate::collect::{CollectingBatchIterator, Collector};
use crate::plan::Footprint;
use crate::traits::{BoxedBatchIterator, OpError};

/// Group key with grouping equality semantics.
#[derive(Debug, Clone)]
pub struct GroupKey(pub Vec<Scalar>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.key_eq(b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash_key(state);
        }
    }
}

pub struct GroupingProjector {
    keys: Vec<usize>,
    aggregations: Vec<Aggregation>,
    mode: AggregateMode,
    ram: RamAccounting,
    footprint: Footprint,
}

impl GroupingProjector {
    pub fn new(
        keys: Vec<usize>,
        aggregations: Vec<Aggregation>,
        mode: AggregateMode,
        ram: RamAccounting,
        footprint: Footprint,
    ) -> Self {
        Self {
            keys,
            aggregations,
            mode,
            ram,
            footprint,
        }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        let collector = GroupingCollector {
            aggregates: Aggregates::new(&self.aggregations, self.mode),
            scope: self.ram.scope("group"),
            keys: self.keys,
            footprint: self.footprint,
            index: HashMap::new(),
            groups: Vec::new(),
        };
        Box::new(CollectingBatchIterator::new(source, collector))
    }
}

pub struct GroupingCollector {
    keys: Vec<usize>,
    aggregates: Aggregates,
    footprint: Footprint,
    scope: AccountingScope,
    index: HashMap<GroupKey, usize>,
    groups: Vec<(OwnedRow, Vec<AggState>)>,
}

impl GroupingCollector {
    fn key_of(&self, row: &Row) -> Result<GroupKey, OpError> {
        self.keys
            .iter()
            .map(|&idx| {
                row.get(idx).cloned().ok_or_else(|| {
                    OpError::Evaluation(format!(
                        "group key column {idx} out of bounds for row of arity {}",
                        row.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(GroupKey)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Collector for GroupingCollector {
    fn name(&self) -> &'static str {
        "group"
    }

    fn accumulate(&mut self, row: &Row) -> Result<(), OpError> {
        let key = self.key_of(row)?;
        let slot = match self.index.entry(key) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                self.scope
                    .add_bytes(self.footprint.group(&e.key().0, self.aggregates.len()))?;
                let slot = self.groups.len();
                self.groups.push((e.key().0.clone(), self.aggregates.init_states()));
                e.insert(slot);
                slot
            }
        };
        let (_, states) = &mut self.groups[slot];
        self.aggregates.update(states, row)
    }

    fn finish(&mut self) -> Result<Vec<OwnedRow>, OpError> {
        self.index.clear();
        let groups = std::mem::take(&mut self.groups);
        tracing::debug!(groups = groups.len(), bytes = self.scope.bytes(), "grouping finished");
        Ok(groups
            .into_iter()
            .map(|(mut row, states)| {
                row.reserve(self.aggregates.len());
                self.aggregates.emit(states, &mut row);
                row
            })
            .collect())
    }

    fn release(&mut self) {
        self.index = HashMap::new();
        self.groups = Vec::new();
        self.scope.release();
    }
}
