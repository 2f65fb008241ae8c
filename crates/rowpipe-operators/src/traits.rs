//! The batch iterator contract + operator errors.
//!
//! A pipeline is a chain of `BatchIterator`s. Exactly one consumer pulls from
//! the outermost one:
//!
//! ```text
//! loop {
//!     while it.move_next()? { use(it.current()) }
//!     if it.all_loaded() { break }
//!     it.load_next_batch().await?;   // the only suspension point
//! }
//! it.close();
//! ```
//!
//! Invariants:
//! - `current()` is only meaningful after `move_next()` returned `true`, and
//!   only until the next call to `move_next()`.
//! - `close()` is idempotent and closes the wrapped source exactly once.
//! - After `close()`, `move_next()` fails with [`OpError::Closed`].

use futures::future::BoxFuture;
use thiserror::Error;

use rowpipe_core::row::Row;

#[derive(Debug, Clone, Error)]
pub enum OpError {
    /// Breaker limit or job quota exceeded.
    #[error(transparent)]
    Memory(#[from] rowpipe_mem::Error),

    /// Type mismatch or invalid operand; indicates a planner bug.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Raised by the row source; propagated unchanged.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("job killed: {0}")]
    JobKilled(String),

    #[error("iterator is closed")]
    Closed,

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl OpError {
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, OpError::Memory(_))
    }
}

/// Lifecycle of a batch iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    NotStarted,
    HasNext,
    Exhausted,
    /// `move_next` returned false but the source is not fully loaded;
    /// the consumer must call `load_next_batch`.
    AwaitingMoreData,
    Failed,
    Closed,
}

impl IteratorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, IteratorState::Closed)
    }
}

pub trait BatchIterator: Send {
    /// Advance to the next row. `Ok(false)` means either exhausted or
    /// awaiting more data; check [`BatchIterator::all_loaded`].
    fn move_next(&mut self) -> Result<bool, OpError>;

    /// Row at the current position.
    fn current(&self) -> &Row;

    /// True once no further `load_next_batch` call can yield rows.
    fn all_loaded(&self) -> bool;

    /// Fetch more rows from the underlying source. Calling this while
    /// `all_loaded()` is true is an error.
    fn load_next_batch(&mut self) -> BoxFuture<'_, Result<(), OpError>>;

    /// Release buffers and accounting, then close the source. Idempotent.
    fn close(&mut self);

    fn state(&self) -> IteratorState;
}

pub type BoxedBatchIterator = Box<dyn BatchIterator>;

/// Error future for `load_next_batch` calls that cannot proceed.
pub(crate) fn failed_load<'a>(err: OpError) -> BoxFuture<'a, Result<(), OpError>> {
    Box::pin(futures::future::ready(Err(err)))
}

/// The state a source reports after `move_next` returned `false`.
pub(crate) fn idle_state(all_loaded: bool) -> IteratorState {
    if all_loaded {
        IteratorState::Exhausted
    } else {
        IteratorState::AwaitingMoreData
    }
}
