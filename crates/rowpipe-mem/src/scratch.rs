//! Scratch memory for expression evaluation.
//!
//! String-building functions write into a [`ScratchBuffer`] whose capacity is
//! accounted against the job before it grows. The buffer is reused across rows
//! of one operator and returns its bytes on drop.

use crate::accounting::{AccountingScope, RamAccounting};
use crate::error::Result;

const MIN_SCRATCH_BYTES: usize = 64;

/// Hands out accounted scratch buffers for one job.
#[derive(Clone, Debug)]
pub struct MemoryManager {
    accounting: RamAccounting,
}

impl MemoryManager {
    pub fn new(accounting: RamAccounting) -> Self {
        Self { accounting }
    }

    pub fn scratch(&self, label: &'static str) -> ScratchBuffer {
        ScratchBuffer {
            scope: self.accounting.scope(label),
            buf: String::new(),
        }
    }

    pub fn accounting(&self) -> &RamAccounting {
        &self.accounting
    }
}

/// Growable text buffer whose capacity is accounted before allocation.
pub struct ScratchBuffer {
    scope: AccountingScope,
    buf: String,
}

impl ScratchBuffer {
    /// Empty the buffer, keeping its accounted capacity.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.reserve(s.len())?;
        self.buf.push_str(s);
        Ok(())
    }

    pub fn push_char(&mut self, c: char) -> Result<()> {
        self.reserve(c.len_utf8())?;
        self.buf.push(c);
        Ok(())
    }

    /// Ensure room for `additional` more bytes, growing geometrically.
    fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self.buf.len() + additional;
        let accounted = self.scope.bytes();
        if needed <= accounted {
            return Ok(());
        }
        let target = needed.next_power_of_two().max(MIN_SCRATCH_BYTES);
        self.scope.add_bytes(target - accounted)?;
        self.buf.reserve(target - self.buf.len());
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current accounted size (bytes).
    pub fn accounted_bytes(&self) -> usize {
        self.scope.bytes()
    }

    /// Drop contents and hand back the accounted capacity.
    pub fn release(&mut self) {
        self.buf = String::new();
        self.scope.release();
    }
}
