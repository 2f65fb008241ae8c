//! Composition and consumption of projector chains.
//!
//! The consumer is the only party that pulls. It checks the kill switch
//! before every row, races each `load_next_batch` against it, and closes the
//! chain exactly once on every exit path.

use rowpipe_core::row::{Bucket, Row};
use rowpipe_mem::AccountingScope;
use rowpipe_operators::{BatchIterator, BoxedBatchIterator, Footprint, OpError, Projector};

use crate::context::{ExecutionContext, KillSwitch};

/// Wrap `source` with each projector in order; the last one is outermost.
pub fn compose(
    source: BoxedBatchIterator,
    projectors: impl IntoIterator<Item = Projector>,
) -> BoxedBatchIterator {
    projectors
        .into_iter()
        .fold(source, |inner, projector| projector.apply(inner))
}

/// Receives the rows of a pipeline.
pub trait RowConsumer: Send {
    type Output: Send;

    fn accept(&mut self, row: &Row) -> Result<(), OpError>;

    fn finish(self) -> Self::Output;
}

/// Materializes every row into a [`Bucket`], accounting each one.
pub struct CollectingConsumer {
    scope: AccountingScope,
    footprint: Footprint,
    bucket: Bucket,
}

impl CollectingConsumer {
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            scope: ctx.ram_accounting().scope("result"),
            footprint: Footprint::default(),
            bucket: Bucket::new(),
        }
    }

    /// Bytes accounted for the rows collected so far.
    pub fn accounted_bytes(&self) -> usize {
        self.scope.bytes()
    }
}

impl RowConsumer for CollectingConsumer {
    type Output = Bucket;

    fn accept(&mut self, row: &Row) -> Result<(), OpError> {
        self.scope.add_bytes(self.footprint.row(row))?;
        self.bucket.push(row.to_vec());
        Ok(())
    }

    fn finish(self) -> Bucket {
        self.bucket
    }
}

/// Pull `it` to completion into `consumer`, then close it.
///
/// The iterator is closed whether the run succeeds, fails or is killed.
pub async fn drive<C: RowConsumer>(
    mut it: BoxedBatchIterator,
    mut consumer: C,
    kill: &KillSwitch,
) -> Result<C::Output, OpError> {
    let result = pull(it.as_mut(), &mut consumer, kill).await;
    it.close();
    result.map(|()| consumer.finish())
}

async fn pull<C: RowConsumer>(
    it: &mut dyn BatchIterator,
    consumer: &mut C,
    kill: &KillSwitch,
) -> Result<(), OpError> {
    loop {
        loop {
            kill.check()?;
            if !it.move_next()? {
                break;
            }
            consumer.accept(it.current())?;
        }
        if it.all_loaded() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = kill.killed() => return kill.check(),
            loaded = it.load_next_batch() => loaded?,
        }
    }
}
