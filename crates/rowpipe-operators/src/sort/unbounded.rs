use rowpipe_core::expr::Expr;
use rowpipe_core::row::{OwnedRow, Row};
use rowpipe_mem::{AccountingScope, MemoryManager};

use crate::collect::{CollectingBatchIterator, Collector};
use crate::expr::{Evaluator, OutputProjection};
use crate::plan::Footprint;
use crate::sort::OrderBy;
use crate::traits::{BoxedBatchIterator, OpError};

/// Ordered top-N without a limit: full stable sort.
pub struct SortingProjector {
    order: OrderBy,
    offset: usize,
    outputs: Vec<Expr>,
    memory: MemoryManager,
    footprint: Footprint,
}

impl SortingProjector {
    pub fn new(
        order: OrderBy,
        offset: usize,
        outputs: Vec<Expr>,
        memory: MemoryManager,
        footprint: Footprint,
    ) -> Self {
        Self {
            order,
            offset,
            outputs,
            memory,
            footprint,
        }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        let collector = SortingCollector {
            scope: self.memory.accounting().scope("sort"),
            output: OutputProjection::new(self.outputs, Evaluator::new(&self.memory, "sort_output")),
            order: self.order,
            offset: self.offset,
            footprint: self.footprint,
            rows: Vec::new(),
        };
        Box::new(CollectingBatchIterator::new(source, collector))
    }
}

pub struct SortingCollector {
    order: OrderBy,
    offset: usize,
    output: OutputProjection,
    footprint: Footprint,
    scope: AccountingScope,
    rows: Vec<OwnedRow>,
}

impl Collector for SortingCollector {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn accumulate(&mut self, row: &Row) -> Result<(), OpError> {
        self.scope.add_bytes(self.footprint.row(row))?;
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<OwnedRow>, OpError> {
        let mut rows = std::mem::take(&mut self.rows);
        let order = &self.order;
        rows.sort_by(|a, b| order.compare(a, b));
        rows.into_iter()
            .skip(self.offset)
            .map(|row| self.output.project_owned(row))
            .collect()
    }

    fn release(&mut self) {
        self.rows = Vec::new();
        self.output.release();
        self.scope.release();
    }
}
