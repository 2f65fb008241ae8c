//! Row sources at the bottom of a pipeline.
//!
//! [`InMemoryBatchIterator`] serves materialized rows, optionally page by page.
//! [`ChannelBatchIterator`] is fed by a producer task (remote shard results,
//! storage readers) through a bounded `tokio::sync::mpsc` channel; its
//! `load_next_batch` is the one place where a pipeline really suspends.

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use rowpipe_core::row::{Bucket, OwnedRow, Row};

use crate::traits::{failed_load, idle_state, BatchIterator, IteratorState, OpError};

/// Materialized rows, served in pages of `batch_size`.
///
/// With the default page size every row is loaded up front. Smaller pages
/// make `move_next` stop at page boundaries until `load_next_batch` is
/// called, which exercises the resume paths of downstream operators.
pub struct InMemoryBatchIterator {
    rows: Vec<OwnedRow>,
    pos: usize,
    loaded_until: usize,
    batch_size: usize,
    current: Option<usize>,
    state: IteratorState,
}

impl InMemoryBatchIterator {
    pub fn new(rows: impl Into<Bucket>) -> Self {
        Self::batched(rows, usize::MAX)
    }

    pub fn batched(rows: impl Into<Bucket>, batch_size: usize) -> Self {
        let rows = rows.into().into_rows();
        let batch_size = batch_size.max(1);
        Self {
            loaded_until: batch_size.min(rows.len()),
            rows,
            pos: 0,
            batch_size,
            current: None,
            state: IteratorState::NotStarted,
        }
    }
}

impl BatchIterator for InMemoryBatchIterator {
    fn move_next(&mut self) -> Result<bool, OpError> {
        if self.state == IteratorState::Closed {
            return Err(OpError::Closed);
        }
        if self.pos < self.loaded_until {
            self.current = Some(self.pos);
            self.pos += 1;
            self.state = IteratorState::HasNext;
            Ok(true)
        } else {
            self.current = None;
            self.state = idle_state(self.all_loaded());
            Ok(false)
        }
    }

    fn current(&self) -> &Row {
        match self.current {
            Some(idx) => &self.rows[idx],
            None => &[],
        }
    }

    fn all_loaded(&self) -> bool {
        self.loaded_until >= self.rows.len()
    }

    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>> {
        if self.state == IteratorState::Closed {
            return failed_load(OpError::Closed);
        }
        if self.all_loaded() {
            return failed_load(OpError::Invariant("all batches already loaded".into()));
        }
        self.loaded_until = self.loaded_until.saturating_add(self.batch_size).min(self.rows.len());
        Box::pin(futures::future::ready(Ok(())))
    }

    fn close(&mut self) {
        if self.state == IteratorState::Closed {
            return;
        }
        self.rows = Vec::new();
        self.current = None;
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}

type BatchMessage = Result<Vec<OwnedRow>, OpError>;

/// Create a channel-backed source and the producer handle feeding it.
pub fn channel(capacity: usize) -> (BatchSender, ChannelBatchIterator) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BatchSender { tx },
        ChannelBatchIterator {
            rx,
            batch: Vec::new(),
            pos: 0,
            current: None,
            finished: false,
            state: IteratorState::NotStarted,
        },
    )
}

/// Producer side of a [`ChannelBatchIterator`]. Dropping every sender marks
/// the source as fully loaded.
#[derive(Clone)]
pub struct BatchSender {
    tx: mpsc::Sender<BatchMessage>,
}

impl BatchSender {
    /// Hand one batch to the consumer, waiting while the channel is full.
    /// Fails with [`OpError::Closed`] once the consumer has closed the source.
    pub async fn send(&self, rows: Vec<OwnedRow>) -> Result<(), OpError> {
        self.tx.send(Ok(rows)).await.map_err(|_| OpError::Closed)
    }

    /// Report an I/O failure; the consumer sees it as [`OpError::Upstream`].
    pub async fn fail(self, reason: impl Into<String>) -> Result<(), OpError> {
        self.tx
            .send(Err(OpError::Upstream(reason.into())))
            .await
            .map_err(|_| OpError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Source fed asynchronously by a [`BatchSender`].
pub struct ChannelBatchIterator {
    rx: mpsc::Receiver<BatchMessage>,
    batch: Vec<OwnedRow>,
    pos: usize,
    current: Option<usize>,
    finished: bool,
    state: IteratorState,
}

impl BatchIterator for ChannelBatchIterator {
    fn move_next(&mut self) -> Result<bool, OpError> {
        match self.state {
            IteratorState::Closed => return Err(OpError::Closed),
            IteratorState::Failed => {
                return Err(OpError::Invariant("move_next on failed source".into()))
            }
            _ => {}
        }
        if self.pos < self.batch.len() {
            self.current = Some(self.pos);
            self.pos += 1;
            self.state = IteratorState::HasNext;
            Ok(true)
        } else {
            self.current = None;
            self.state = idle_state(self.finished);
            Ok(false)
        }
    }

    fn current(&self) -> &Row {
        match self.current {
            Some(idx) => &self.batch[idx],
            None => &[],
        }
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
            // Suspension point: waits until the producer delivers or finishes.
            match self.rx.recv().await {
                Some(Ok(rows)) => {
                    self.batch = rows;
                    self.pos = 0;
                    self.current = None;
                    Ok(())
                }
                Some(Err(e)) => {
                    self.state = IteratorState::Failed;
                    Err(e)
                }
                None => {
                    self.batch = Vec::new();
                    self.pos = 0;
                    self.finished = true;
                    Ok(())
                }
            }
        })
    }

    fn close(&mut self) {
        if self.state == IteratorState::Closed {
            return;
        }
        // Producers blocked in `send` wake up with `Closed`.
        self.rx.close();
        self.batch = Vec::new();
        self.current = None;
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::row;

    #[test]
    fn in_memory_pages_require_loading() {
        let rows: Vec<OwnedRow> = (0..5).map(|i| row![i]).collect();
        let mut it = InMemoryBatchIterator::batched(rows, 2);

        assert!(it.move_next().unwrap());
        assert!(it.move_next().unwrap());
        assert!(!it.move_next().unwrap());
        assert_eq!(it.state(), IteratorState::AwaitingMoreData);
        assert!(!it.all_loaded());

        futures::executor::block_on(it.load_next_batch()).unwrap();
        assert!(it.move_next().unwrap());
        assert_eq!(it.current(), &row![2][..]);
    }

    #[test]
    fn closed_source_rejects_pulls() {
        let mut it = InMemoryBatchIterator::new(vec![row![1]]);
        it.close();
        it.close();
        assert!(matches!(it.move_next(), Err(OpError::Closed)));
        assert_eq!(it.state(), IteratorState::Closed);
    }

    #[tokio::test]
    async fn channel_source_delivers_batches_then_finishes() {
        let (tx, mut it) = channel(2);
        let producer = tokio::spawn(async move {
            tx.send(vec![row![1], row![2]]).await.unwrap();
            tx.send(vec![row![3]]).await.unwrap();
        });

        let mut seen = Vec::new();
        loop {
            while it.move_next().unwrap() {
                seen.push(it.current().to_vec());
            }
            if it.all_loaded() {
                break;
            }
            it.load_next_batch().await.unwrap();
        }
        producer.await.unwrap();
        assert_eq!(seen, vec![row![1], row![2], row![3]]);
        assert_eq!(it.state(), IteratorState::Exhausted);
    }
}
