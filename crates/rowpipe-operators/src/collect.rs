//! Blocking operators: consume the whole input, then emit results.
//!
//! A [`Collector`] holds whatever state the operator needs (sorted buffer,
//! bounded heap, aggregate states) and turns it into rows once the source is
//! fully loaded. [`CollectingBatchIterator`] drives it with the pull protocol:
//! while the source still has batches to load, `move_next` returns `false`
//! and `load_next_batch` is delegated to the source.

use futures::future::BoxFuture;

use rowpipe_core::row::{OwnedRow, Row};

use crate::traits::{failed_load, BatchIterator, BoxedBatchIterator, IteratorState, OpError};

pub trait Collector: Send {
    fn name(&self) -> &'static str;

    /// Fold one input row into the collector state.
    fn accumulate(&mut self, row: &Row) -> Result<(), OpError>;

    /// Produce the output rows. Called once, after the last `accumulate`.
    fn finish(&mut self) -> Result<Vec<OwnedRow>, OpError>;

    /// Drop buffered state and return its accounted bytes. Idempotent.
    fn release(&mut self);
}

pub struct CollectingBatchIterator<C: Collector> {
    source: BoxedBatchIterator,
    collector: C,
    results: std::vec::IntoIter<OwnedRow>,
    current: OwnedRow,
    finished: bool,
    state: IteratorState,
}

impl<C: Collector> CollectingBatchIterator<C> {
    pub fn new(source: BoxedBatchIterator, collector: C) -> Self {
        Self {
            source,
            collector,
            results: Vec::new().into_iter(),
            current: Vec::new(),
            finished: false,
            state: IteratorState::NotStarted,
        }
    }

    fn fail(&mut self, err: OpError) -> OpError {
        self.state = IteratorState::Failed;
        self.collector.release();
        err
    }

    /// Consume whatever the source has loaded. `Ok(true)` once results are ready.
    fn collect(&mut self) -> Result<bool, OpError> {
        while self.source.move_next()? {
            self.collector.accumulate(self.source.current())?;
        }
        if !self.source.all_loaded() {
            return Ok(false);
        }
        self.results = self.collector.finish()?.into_iter();
        self.finished = true;
        tracing::trace!(
            collector = self.collector.name(),
            rows = self.results.len(),
            "collector finished"
        );
        Ok(true)
    }
}

impl<C: Collector> BatchIterator for CollectingBatchIterator<C> {
    fn move_next(&mut self) -> Result<bool, OpError> {
        match self.state {
            IteratorState::Closed => return Err(OpError::Closed),
            IteratorState::Failed => {
                return Err(OpError::Invariant("move_next on failed collector".into()))
            }
            _ => {}
        }
        if !self.finished {
            match self.collect() {
                Ok(true) => {}
                Ok(false) => {
                    self.state = IteratorState::AwaitingMoreData;
                    return Ok(false);
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
        match self.results.next() {
            Some(row) => {
                self.current = row;
                self.state = IteratorState::HasNext;
                Ok(true)
            }
            None => {
                self.current = Vec::new();
                self.state = IteratorState::Exhausted;
                Ok(false)
            }
        }
    }

    fn current(&self) -> &Row {
        &self.current
    }

    fn all_loaded(&self) -> bool {
        self.finished
    }

    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>> {
        if self.state == IteratorState::Closed {
            return failed_load(OpError::Closed);
        }
        if self.finished {
            return failed_load(OpError::Invariant("all batches already loaded".into()));
        }
        Box::pin(async move {
            let loaded = self.source.load_next_batch().await;
            // Buffered state goes back before the error reaches the consumer.
            loaded.map_err(|e| self.fail(e))
        })
    }

    fn close(&mut self) {
        if self.state == IteratorState::Closed {
            return;
        }
        self.collector.release();
        self.results = Vec::new().into_iter();
        self.current = Vec::new();
        self.source.close();
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}
