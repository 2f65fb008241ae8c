//! Bounded ordered top-N.
//!
//! Keeps at most `limit + offset` rows in a max-heap keyed by the row order
//! plus an arrival sequence number. The heap top is the worst kept row; a new
//! row replaces it only if it sorts strictly before it, so among equal rows
//! the earlier ones survive, same as a stable sort.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rowpipe_core::expr::Expr;
use rowpipe_core::row::{OwnedRow, Row};
use rowpipe_mem::{AccountingScope, MemoryManager};

use crate::collect::{CollectingBatchIterator, Collector};
use crate::expr::{Evaluator, OutputProjection};
use crate::plan::Footprint;
use crate::sort::OrderBy;
use crate::traits::{BoxedBatchIterator, OpError};

pub struct SortingTopNProjector {
    order: OrderBy,
    limit: usize,
    offset: usize,
    outputs: Vec<Expr>,
    memory: MemoryManager,
    footprint: Footprint,
}

impl SortingTopNProjector {
    pub fn new(
        order: OrderBy,
        limit: usize,
        offset: usize,
        outputs: Vec<Expr>,
        memory: MemoryManager,
        footprint: Footprint,
    ) -> Self {
        Self {
            order,
            limit,
            offset,
            outputs,
            memory,
            footprint,
        }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        let capacity = self.limit.saturating_add(self.offset);
        let collector = SortingTopNCollector {
            scope: self.memory.accounting().scope("sort_topn"),
            output: OutputProjection::new(self.outputs, Evaluator::new(&self.memory, "sort_topn_output")),
            order: Arc::new(self.order),
            limit: self.limit,
            offset: self.offset,
            capacity,
            footprint: self.footprint,
            heap: BinaryHeap::new(),
            seq: 0,
        };
        Box::new(CollectingBatchIterator::new(source, collector))
    }
}

struct HeapEntry {
    row: OwnedRow,
    seq: u64,
    bytes: usize,
    order: Arc<OrderBy>,
}

impl HeapEntry {
    fn cmp_row(&self, row: &Row, seq: u64) -> Ordering {
        self.order
            .compare(&self.row, row)
            .then_with(|| self.seq.cmp(&seq))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_row(&other.row, other.seq)
    }
}

pub struct SortingTopNCollector {
    order: Arc<OrderBy>,
    limit: usize,
    offset: usize,
    capacity: usize,
    output: OutputProjection,
    footprint: Footprint,
    scope: AccountingScope,
    heap: BinaryHeap<HeapEntry>,
    seq: u64,
}

impl SortingTopNCollector {
    /// True if a row arriving now would be kept.
    fn admits(&self, row: &Row) -> bool {
        if self.heap.len() < self.capacity {
            return true;
        }
        match self.heap.peek() {
            // The incoming row has the highest sequence so far; it wins only on
            // a strictly better order key.
            Some(worst) => worst.order.compare(&worst.row, row) == Ordering::Greater,
            None => false,
        }
    }
}

impl Collector for SortingTopNCollector {
    fn name(&self) -> &'static str {
        "sort_topn"
    }

    fn accumulate(&mut self, row: &Row) -> Result<(), OpError> {
        let seq = self.seq;
        self.seq += 1;
        if !self.admits(row) {
            return Ok(());
        }
        let bytes = self.footprint.row(row);
        self.scope.add_bytes(bytes)?;
        if self.heap.len() >= self.capacity {
            if let Some(evicted) = self.heap.pop() {
                self.scope.release_bytes(evicted.bytes);
            }
        }
        self.heap.push(HeapEntry {
            row: row.to_vec(),
            seq,
            bytes,
            order: Arc::clone(&self.order),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<OwnedRow>, OpError> {
        let heap = std::mem::take(&mut self.heap);
        heap.into_sorted_vec()
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .map(|entry| self.output.project_owned(entry.row))
            .collect()
    }

    fn release(&mut self) {
        self.heap = BinaryHeap::new();
        self.output.release();
        self.scope.release();
    }
}
