//! Result sequencing
//!
//! Multi-key ordering of a fully materialized result.

use std::cmp::Ordering;

use super::result::ResultRow;
use crate::value::CellValue;

/// Orders result rows
pub struct ResultSequencer;

impl ResultSequencer {
    /// Sorts rows by their `sort_keys`; `descending[i]` gives the
    /// direction of key `i`.
    ///
    /// One stable pass per key, last key first, so the first key ends
    /// up dominant.
    pub fn sort(rows: &mut [ResultRow], descending: &[bool]) {
        for (key, desc) in descending.iter().enumerate().rev() {
            rows.sort_by(|a, b| Self::compare_key(&a.sort_keys[key], &b.sort_keys[key], *desc));
        }
    }

    /// Compares on (is non-null, value).
    ///
    /// Only the value part is reversed for descending keys, so nulls
    /// come first in both directions. Values are type-ordered:
    /// bool < number < string.
    pub fn compare_key(a: &CellValue, b: &CellValue, descending: bool) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let ordering = a.total_cmp(b);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, keys: Vec<CellValue>) -> ResultRow {
        ResultRow {
            values: vec![id.into()],
            sort_keys: keys,
            distinct_on: Vec::new(),
        }
    }

    fn ids(rows: &[ResultRow]) -> Vec<CellValue> {
        rows.iter().map(|r| r.values[0].clone()).collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut rows = vec![
            row(1, vec![30i64.into()]),
            row(2, vec![20i64.into()]),
            row(3, vec![25i64.into()]),
        ];
        ResultSequencer::sort(&mut rows, &[false]);
        assert_eq!(ids(&rows), vec![2i64.into(), 3i64.into(), 1i64.into()]);
    }

    #[test]
    fn test_nulls_first_both_directions() {
        let make = || {
            vec![
                row(1, vec!["b".into()]),
                row(2, vec![CellValue::Null]),
                row(3, vec!["a".into()]),
            ]
        };

        let mut asc = make();
        ResultSequencer::sort(&mut asc, &[false]);
        assert_eq!(ids(&asc), vec![2i64.into(), 3i64.into(), 1i64.into()]);

        let mut desc = make();
        ResultSequencer::sort(&mut desc, &[true]);
        assert_eq!(ids(&desc), vec![2i64.into(), 1i64.into(), 3i64.into()]);
    }

    #[test]
    fn test_sort_stable() {
        // Same key, original order preserved
        let mut rows = vec![
            row(1, vec![25i64.into()]),
            row(2, vec![25i64.into()]),
            row(3, vec![25i64.into()]),
        ];
        ResultSequencer::sort(&mut rows, &[true]);
        assert_eq!(ids(&rows), vec![1i64.into(), 2i64.into(), 3i64.into()]);
    }

    #[test]
    fn test_first_key_dominates() {
        let mut rows = vec![
            row(1, vec!["x".into(), 1i64.into()]),
            row(2, vec!["y".into(), 3i64.into()]),
            row(3, vec!["x".into(), 2i64.into()]),
        ];
        ResultSequencer::sort(&mut rows, &[false, true]);
        assert_eq!(ids(&rows), vec![3i64.into(), 1i64.into(), 2i64.into()]);
    }
}
