use std::cmp::Ordering;

use rowpipe_core::row::Row;
use rowpipe_core::types::{compare_values, Scalar};

/// Row comparator over one or more input columns.
///
/// Null placement is resolved per column: an explicit `nulls_first` wins,
/// otherwise nulls go last ascending and first descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<SortKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortKey {
    column: usize,
    reverse: bool,
    nulls_first: bool,
}

impl OrderBy {
    /// Slices must have equal length; `Projection::validate` checks that.
    pub fn new(columns: &[usize], reverse_flags: &[bool], nulls_first: &[Option<bool>]) -> Self {
        let keys = columns
            .iter()
            .zip(reverse_flags)
            .zip(nulls_first)
            .map(|((&column, &reverse), nulls_first)| SortKey {
                column,
                reverse,
                nulls_first: nulls_first.unwrap_or(reverse),
            })
            .collect();
        Self { keys }
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.keys {
            let ord = key.compare(a.get(key.column), b.get(key.column));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn is_null(value: Option<&Scalar>) -> bool {
    value.map_or(true, Scalar::is_null)
}

impl SortKey {
    fn compare(&self, a: Option<&Scalar>, b: Option<&Scalar>) -> Ordering {
        let null_side = if self.nulls_first {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        match (a, b) {
            (a, b) if is_null(a) && is_null(b) => Ordering::Equal,
            (a, _) if is_null(a) => null_side,
            (_, b) if is_null(b) => null_side.reverse(),
            (Some(a), Some(b)) => {
                let ord = compare_values(a, b);
                if self.reverse {
                    ord.reverse()
                } else {
                    ord
                }
            }
            _ => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::row;

    #[test]
    fn nulls_default_last_ascending_first_descending() {
        let asc = OrderBy::new(&[0], &[false], &[None]);
        assert_eq!(asc.compare(&row![Scalar::Null], &row![1]), Ordering::Greater);

        let desc = OrderBy::new(&[0], &[true], &[None]);
        assert_eq!(desc.compare(&row![Scalar::Null], &row![1]), Ordering::Less);
        assert_eq!(desc.compare(&row![2], &row![1]), Ordering::Less);
    }

    #[test]
    fn explicit_null_placement_ignores_direction() {
        let desc_nulls_last = OrderBy::new(&[0], &[true], &[Some(false)]);
        assert_eq!(
            desc_nulls_last.compare(&row![Scalar::Null], &row![1]),
            Ordering::Greater
        );
    }

    #[test]
    fn later_columns_break_ties() {
        let order = OrderBy::new(&[0, 1], &[false, true], &[None, None]);
        assert_eq!(order.compare(&row!["a", 1], &row!["a", 2]), Ordering::Greater);
        assert_eq!(order.compare(&row!["a", 1], &row!["b", 9]), Ordering::Less);
    }
}
