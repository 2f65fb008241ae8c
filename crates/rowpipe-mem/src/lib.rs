#![forbid(unsafe_code)]
//! rowpipe-mem: hard memory accounting for pipelines.
//!
//! - [`CircuitBreaker`]: process-wide byte ceiling shared by every pipeline,
//!   constructed explicitly and passed by handle (no global singleton).
//! - [`RamAccounting`]: per-job handle with an optional quota; operators open
//!   an [`AccountingScope`] from it and grow it before buffering rows.
//! - [`MemoryManager`]: scratch buffers for expression evaluation, accounted
//!   through the same job handle.
//!
//! Every reservation is RAII: dropping a scope or buffer returns its bytes.

pub mod accounting;
pub mod breaker;
pub mod error;
pub mod scratch;
pub mod tracking;

pub use accounting::{AccountingScope, RamAccounting};
pub use breaker::{BreakerGuard, CircuitBreaker};
pub use error::{Error, Result};
pub use scratch::{MemoryManager, ScratchBuffer};
pub use tracking::PeakTracker;
