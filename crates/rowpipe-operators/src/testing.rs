//! Helpers for driving iterators in tests and benches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use rowpipe_core::row::{OwnedRow, Row};
use rowpipe_core::row;

use crate::traits::{failed_load, BatchIterator, BoxedBatchIterator, IteratorState, OpError};

/// Single-column rows `[start, end)` as bigint.
pub fn range(start: i64, end: i64) -> Vec<OwnedRow> {
    (start..end).map(|i| row![i]).collect()
}

/// Pull every row with the consumer protocol, then close the iterator.
pub async fn drain(mut it: BoxedBatchIterator) -> Result<Vec<OwnedRow>, OpError> {
    let result = pull_all(it.as_mut()).await;
    it.close();
    result
}

async fn pull_all(it: &mut dyn BatchIterator) -> Result<Vec<OwnedRow>, OpError> {
    let mut rows = Vec::new();
    loop {
        while it.move_next()? {
            rows.push(it.current().to_vec());
        }
        if it.all_loaded() {
            return Ok(rows);
        }
        it.load_next_batch().await?;
    }
}

/// Wraps a source and counts how often `close` reaches it.
pub struct CloseCounting {
    inner: BoxedBatchIterator,
    closes: Arc<AtomicUsize>,
}

impl CloseCounting {
    pub fn new(inner: BoxedBatchIterator) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                closes: Arc::clone(&closes),
            },
            closes,
        )
    }
}

impl BatchIterator for CloseCounting {
    fn move_next(&mut self) -> Result<bool, OpError> {
        self.inner.move_next()
    }

    fn current(&self) -> &Row {
        self.inner.current()
    }

    fn all_loaded(&self) -> bool {
        self.inner.all_loaded()
    }

    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>> {
        self.inner.load_next_batch()
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }

    fn state(&self) -> IteratorState {
        self.inner.state()
    }
}

/// Source that yields `rows` and then fails its next load with `Upstream`.
pub struct FailingSource {
    rows: Vec<OwnedRow>,
    pos: usize,
    reason: String,
    state: IteratorState,
}

impl FailingSource {
    pub fn new(rows: Vec<OwnedRow>, reason: impl Into<String>) -> Self {
        Self {
            rows,
            pos: 0,
            reason: reason.into(),
            state: IteratorState::NotStarted,
        }
    }
}

impl BatchIterator for FailingSource {
    fn move_next(&mut self) -> Result<bool, OpError> {
        if self.state == IteratorState::Closed {
            return Err(OpError::Closed);
        }
        if self.pos < self.rows.len() {
            self.pos += 1;
            self.state = IteratorState::HasNext;
            Ok(true)
        } else {
            self.state = IteratorState::AwaitingMoreData;
            Ok(false)
        }
    }

    fn current(&self) -> &Row {
        match self.pos.checked_sub(1) {
            Some(idx) if self.state == IteratorState::HasNext => &self.rows[idx],
            _ => &[],
        }
    }

    fn all_loaded(&self) -> bool {
        false
    }

    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>> {
        if self.state == IteratorState::Closed {
            return failed_load(OpError::Closed);
        }
        self.state = IteratorState::Failed;
        failed_load(OpError::Upstream(self.reason.clone()))
    }

    fn close(&mut self) {
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}
