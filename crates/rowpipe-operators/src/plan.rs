//! Memory model for buffering operators.
//!
//! A `Footprint` turns a buffered row or a grouping state into the number of
//! bytes to account before keeping it. Estimates are coarse: scalar payloads
//! plus a fixed per-entry overhead for the container holding them.

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use rowpipe_core::row::{estimate_row_size, OwnedRow, Row};

/// Coarse memory model for rows and states buffered by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Fixed bytes per buffered row on top of its payload (vec header, heap slot).
    pub bytes_per_row: usize,
    /// Fixed bytes per grouping state (hash table slot, aggregate states).
    pub bytes_per_state: usize,
}

impl Default for Footprint {
    fn default() -> Self {
        Self {
            bytes_per_row: size_of::<OwnedRow>() + size_of::<u64>(),
            bytes_per_state: 2 * size_of::<OwnedRow>(),
        }
    }
}

impl Footprint {
    /// Bytes to account before buffering `row`.
    pub fn row(&self, row: &Row) -> usize {
        self.bytes_per_row + estimate_row_size(row)
    }

    /// Bytes to account before creating a group for `key` holding `aggregates` states.
    pub fn group(&self, key: &Row, aggregates: usize) -> usize {
        self.bytes_per_state + estimate_row_size(key) + aggregates * size_of::<OwnedRow>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::row;

    #[test]
    fn wider_rows_cost_more() {
        let fp = Footprint::default();
        let narrow = fp.row(&row![1]);
        let wide = fp.row(&row![1, "a much longer text payload"]);
        assert!(wide > narrow);
        assert!(narrow > fp.bytes_per_row);
    }
}
