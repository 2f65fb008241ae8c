//! Unordered top-N: skip `offset` rows, then emit at most `limit`.
//!
//! Once the limit is reached the iterator reports itself fully loaded so the
//! consumer stops pulling; remaining source rows are never read.

use futures::future::BoxFuture;

use rowpipe_core::expr::Expr;
use rowpipe_core::row::Row;
use rowpipe_mem::MemoryManager;

use crate::expr::{Evaluator, OutputProjection};
use crate::traits::{
    failed_load, idle_state, BatchIterator, BoxedBatchIterator, IteratorState, OpError,
};

pub struct SimpleTopNProjector {
    limit: Option<usize>,
    offset: usize,
    outputs: Vec<Expr>,
    memory: MemoryManager,
}

impl SimpleTopNProjector {
    pub fn new(limit: Option<usize>, offset: usize, outputs: Vec<Expr>, memory: MemoryManager) -> Self {
        Self {
            limit,
            offset,
            outputs,
            memory,
        }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        Box::new(LimitingBatchIterator {
            source,
            to_skip: self.offset,
            remaining: self.limit,
            output: OutputProjection::new(self.outputs, Evaluator::new(&self.memory, "topn_output")),
            state: IteratorState::NotStarted,
        })
    }
}

pub struct LimitingBatchIterator {
    source: BoxedBatchIterator,
    to_skip: usize,
    /// `None` when unlimited.
    remaining: Option<usize>,
    output: OutputProjection,
    state: IteratorState,
}

impl LimitingBatchIterator {
    fn fail(&mut self, err: OpError) -> OpError {
        self.state = IteratorState::Failed;
        self.output.release();
        err
    }

    fn limit_reached(&self) -> bool {
        self.remaining == Some(0)
    }

    fn advance(&mut self) -> Result<bool, OpError> {
        if self.limit_reached() {
            return Ok(false);
        }
        while self.source.move_next()? {
            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            self.output.project(self.source.current())?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl BatchIterator for LimitingBatchIterator {
    fn move_next(&mut self) -> Result<bool, OpError> {
        match self.state {
            IteratorState::Closed => return Err(OpError::Closed),
            IteratorState::Failed => {
                return Err(OpError::Invariant("move_next on failed limit".into()))
            }
            _ => {}
        }
        match self.advance() {
            Ok(true) => {
                self.state = IteratorState::HasNext;
                Ok(true)
            }
            Ok(false) => {
                self.state = idle_state(self.all_loaded());
                Ok(false)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn current(&self) -> &Row {
        self.output.row(self.source.current())
    }

    fn all_loaded(&self) -> bool {
        self.limit_reached() || self.source.all_loaded()
    }

    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>> {
        if self.state == IteratorState::Closed {
            return failed_load(OpError::Closed);
        }
        if self.limit_reached() {
            return failed_load(OpError::Invariant("limit already reached".into()));
        }
        Box::pin(async move {
            let loaded = self.source.load_next_batch().await;
            loaded.map_err(|e| self.fail(e))
        })
    }

    fn close(&mut self) {
        if self.state == IteratorState::Closed {
            return;
        }
        self.output.release();
        self.source.close();
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}
