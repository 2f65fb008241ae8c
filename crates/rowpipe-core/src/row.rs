//! Rows and buckets.
//!
//! A row is a borrowed `&[Scalar]` view that is valid for one iteration step.
//! Operators that need random access or several passes materialize rows into
//! a [`Bucket`].

use std::mem;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::types::Scalar;

/// Borrowed, fixed-arity view over one tuple of values.
pub type Row = [Scalar];

/// Owned copy of a row.
pub type OwnedRow = Vec<Scalar>;

/// Build an owned row from anything convertible into [`Scalar`].
///
/// ```
/// use rowpipe_core::row;
/// use rowpipe_core::types::Scalar;
///
/// let r = row!["human", 34, Scalar::Null];
/// assert_eq!(r.len(), 3);
/// ```
#[macro_export]
macro_rules! row {
    () => { ::std::vec::Vec::<$crate::types::Scalar>::new() };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::types::Scalar::from($v)),+]
    };
}

/// Approximate bytes retained by a materialized row.
pub fn estimate_row_size(row: &Row) -> usize {
    mem::size_of::<OwnedRow>() + row.iter().map(Scalar::estimated_size).sum::<usize>()
}

/// Owned, finite, indexable collection of materialized rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    rows: Vec<OwnedRow>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            rows: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: OwnedRow) {
        self.rows.push(row);
    }

    pub fn get(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<OwnedRow> {
        self.rows
    }
}

impl Index<usize> for Bucket {
    type Output = Row;

    fn index(&self, idx: usize) -> &Row {
        &self.rows[idx]
    }
}

impl From<Vec<OwnedRow>> for Bucket {
    fn from(rows: Vec<OwnedRow>) -> Self {
        Self { rows }
    }
}

impl FromIterator<OwnedRow> for Bucket {
    fn from_iter<I: IntoIterator<Item = OwnedRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Bucket {
    type Item = OwnedRow;
    type IntoIter = std::vec::IntoIter<OwnedRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
