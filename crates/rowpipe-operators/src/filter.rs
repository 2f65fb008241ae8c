//! Streaming filter: drops rows whose predicate is not `true`.
//!
//! Null and false both drop the row. Surviving rows go through the stage's
//! output expressions; identity outputs pass the source row through as is.

use futures::future::BoxFuture;

use rowpipe_core::expr::Expr;
use rowpipe_core::row::Row;
use rowpipe_mem::MemoryManager;

use crate::expr::{Evaluator, OutputProjection};
use crate::traits::{
    failed_load, idle_state, BatchIterator, BoxedBatchIterator, IteratorState, OpError,
};

pub struct FilterProjector {
    predicate: Expr,
    outputs: Vec<Expr>,
    memory: MemoryManager,
}

impl FilterProjector {
    pub fn new(predicate: Expr, outputs: Vec<Expr>, memory: MemoryManager) -> Self {
        Self {
            predicate,
            outputs,
            memory,
        }
    }

    pub fn apply(self, source: BoxedBatchIterator) -> BoxedBatchIterator {
        Box::new(FilteringBatchIterator {
            source,
            evaluator: Evaluator::new(&self.memory, "filter"),
            output: OutputProjection::new(self.outputs, Evaluator::new(&self.memory, "filter_output")),
            predicate: self.predicate,
            state: IteratorState::NotStarted,
        })
    }
}

pub struct FilteringBatchIterator {
    source: BoxedBatchIterator,
    predicate: Expr,
    evaluator: Evaluator,
    output: OutputProjection,
    state: IteratorState,
}

impl FilteringBatchIterator {
    fn fail(&mut self, err: OpError) -> OpError {
        self.state = IteratorState::Failed;
        self.evaluator.release();
        self.output.release();
        err
    }

    fn advance(&mut self) -> Result<bool, OpError> {
        while self.source.move_next()? {
            let row = self.source.current();
            if self.evaluator.eval_predicate(&self.predicate, row)? {
                self.output.project(row)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl BatchIterator for FilteringBatchIterator {
    fn move_next(&mut self) -> Result<bool, OpError> {
        match self.state {
            IteratorState::Closed => return Err(OpError::Closed),
            IteratorState::Failed => {
                return Err(OpError::Invariant("move_next on failed filter".into()))
            }
            _ => {}
        }
        match self.advance() {
            Ok(true) => {
                self.state = IteratorState::HasNext;
                Ok(true)
            }
            Ok(false) => {
                self.state = idle_state(self.source.all_loaded());
                Ok(false)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn current(&self) -> &Row {
        self.output.row(self.source.current())
    }

    fn all_loaded(&self) -> bool {
        self.source.all_loaded()
    }

    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>> {
        if self.state == IteratorState::Closed {
            return failed_load(OpError::Closed);
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
        self.evaluator.release();
        self.output.release();
        self.source.close();
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryBatchIterator;
    use crate::testing::{drain, FailingSource};
    use rowpipe_core::row;
    use rowpipe_core::types::Scalar;
    use rowpipe_mem::RamAccounting;

    fn memory() -> MemoryManager {
        MemoryManager::new(RamAccounting::no_accounting())
    }

    #[test]
    fn null_predicate_drops_row() {
        let rows = vec![row![1, "a"], row![Scalar::Null, "b"], row![2, "c"]];
        let pred = Expr::compare(
            rowpipe_core::expr::CompareOp::Gt,
            Expr::col(0),
            Expr::lit(0),
        );
        let it = FilterProjector::new(pred, Expr::identity(2), memory())
            .apply(Box::new(InMemoryBatchIterator::new(rows)));
        let out = futures::executor::block_on(drain(it)).unwrap();
        assert_eq!(out, vec![row![1, "a"], row![2, "c"]]);
    }

    #[test]
    fn outputs_are_evaluated_on_matching_rows() {
        let rows = vec![row![1, "a"], row![2, "b"]];
        let pred = Expr::equals(Expr::col(1), Expr::lit("b"));
        let it = FilterProjector::new(pred, vec![Expr::col(1)], memory())
            .apply(Box::new(InMemoryBatchIterator::new(rows)));
        let out = futures::executor::block_on(drain(it)).unwrap();
        assert_eq!(out, vec![row!["b"]]);
    }

    #[test]
    fn failed_filter_stays_failed() {
        let rows = vec![row!["bad"], row![5]];
        let pred = Expr::compare(
            rowpipe_core::expr::CompareOp::Gt,
            Expr::col(0),
            Expr::lit(0),
        );
        let mut it = FilterProjector::new(pred, Expr::identity(1), memory())
            .apply(Box::new(InMemoryBatchIterator::new(rows)));

        assert!(matches!(it.move_next(), Err(OpError::Evaluation(_))));
        assert_eq!(it.state(), IteratorState::Failed);
        assert!(it.move_next().is_err());
        assert_eq!(it.state(), IteratorState::Failed);

        it.close();
        assert_eq!(it.state(), IteratorState::Closed);
    }

    #[tokio::test]
    async fn upstream_load_error_fails_the_filter() {
        let pred = Expr::compare(
            rowpipe_core::expr::CompareOp::Gt,
            Expr::col(0),
            Expr::lit(0),
        );
        let source = FailingSource::new(vec![row![1]], "io");
        let mut it = FilterProjector::new(pred, Expr::identity(1), memory()).apply(Box::new(source));

        assert!(it.move_next().unwrap());
        assert!(!it.move_next().unwrap());
        let err = it.load_next_batch().await.unwrap_err();
        assert!(matches!(err, OpError::Upstream(ref reason) if reason == "io"));
        assert_eq!(it.state(), IteratorState::Failed);
        assert!(it.move_next().is_err());
    }
}
