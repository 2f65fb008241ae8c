#![forbid(unsafe_code)]
//! rowpipe-core: values, rows, projections and shared interfaces.
//!
//! Pure data plus a few small algorithms (value ordering, key hashing, size
//! estimation). No async, no I/O: operators and the runtime live downstream.

pub mod config;
pub mod error;
pub mod expr;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod projection;
pub mod row;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
