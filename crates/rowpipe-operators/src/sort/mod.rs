//! Ordered top-N.
//!
//! - [`unbounded`]: no limit; buffer every row, stable sort, slice by offset.
//! - [`bounded`]: keep only the best `limit + offset` rows in a max-heap.
//!
//! Both agree on output for the same input, including ties (input order wins).

pub mod bounded;
pub mod comparator;
pub mod unbounded;

pub use bounded::{SortingTopNCollector, SortingTopNProjector};
pub use comparator::OrderBy;
pub use unbounded::{SortingCollector, SortingProjector};
