use std::collections::BTreeSet;
use std::ptr;

use bitvec::prelude::*;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::column::{Column, RowId};

#[derive(Debug, Default)]
struct ConditionState {
    /// Matching row identifiers. Kept ordered so projections come out sorted.
    ids: BTreeSet<RowId>,
    /// Cached cardinality of `ids`.
    num_results: usize,
    /// Columns the condition was built over, informational only.
    cols: Vec<String>,
}

/// A working set of row identifiers produced by range predicates.
///
/// A condition is filled by [Condition::select], refined with [Condition::or]
/// and [Condition::and], and read with [Condition::get]. Mutators take the
/// condition's lock exclusively while `get` shares it, so many readers can
/// project a stable set concurrently.
///
/// Lock order: a condition is always locked before any column it reaches into.
/// When two conditions are combined, their locks are taken in address order.
///
/// # Example
/// ```
/// use colstore::{Column, Condition};
///
/// let x = Column::new("x", 16);
/// x.load(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
/// let y = Column::new("y", 16);
/// y.load(&[1, 4, 9, 16, 25, 36, 49, 64, 81]);
///
/// let small = Condition::new();
/// small.select(&x, 2, 6);
/// let big = Condition::new();
/// big.select(&y, 30, 81);
///
/// small.or(&big);
/// assert_eq!(small.ids(), vec![1, 2, 3, 4, 5, 6, 7]);
///
/// small.and(&big);
/// assert_eq!(small.get(&[&x, &y]), vec![vec![6, 7, 8], vec![36, 49, 64]]);
/// ```
#[derive(Debug, Default)]
pub struct Condition {
    state: RwLock<ConditionState>,
}

impl Condition {
    /// Creates a condition matching no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every row `i` of `column` with `lower <= column[i] < upper`.
    ///
    /// Only the logical range of the column is scanned, under the column lock.
    pub fn select(&self, column: &Column, lower: i64, upper: i64) {
        let mut state = self.state.write();
        let state = &mut *state;

        let added = column.with_values(|values| {
            let mut added = 0;
            for (row, &value) in values.iter().enumerate() {
                if lower <= value && value < upper && state.ids.insert(row) {
                    added += 1;
                }
            }
            added
        });
        state.num_results += added;

        if !state.cols.iter().any(|c| c == column.name()) {
            state.cols.push(column.name().to_string());
        }
        debug!(column = column.name(), lower, upper, added, "select");
    }

    /// Turns this condition into the union of itself and `other`.
    ///
    /// Combining a condition with itself is a no-op.
    pub fn or(&self, other: &Condition) {
        if ptr::eq(self, other) {
            return;
        }
        let (mut mine, theirs) = self.lock_pair(other);
        let mine = &mut *mine;
        for &row in &theirs.ids {
            if mine.ids.insert(row) {
                mine.num_results += 1;
            }
        }
        merge_cols(&mut mine.cols, &theirs.cols);
    }

    /// Turns this condition into the intersection of itself and `other`.
    ///
    /// Combining a condition with itself is a no-op.
    pub fn and(&self, other: &Condition) {
        if ptr::eq(self, other) {
            return;
        }
        let (mut mine, theirs) = self.lock_pair(other);
        let mine = &mut *mine;
        let before = mine.ids.len();
        mine.ids.retain(|row| theirs.ids.contains(row));
        mine.num_results -= before - mine.ids.len();
        merge_cols(&mut mine.cols, &theirs.cols);
    }

    /// Projects the matched rows onto each of `columns`, in ascending row order.
    ///
    /// Returns an empty result without touching any column when nothing matches.
    /// A matched row beyond a column's logical length reads as `0`.
    pub fn get(&self, columns: &[&Column]) -> Vec<Vec<i64>> {
        let state = self.state.read();
        if state.num_results == 0 {
            debug!("no results found for query condition");
            return Vec::new();
        }

        columns
            .iter()
            .map(|column| {
                column.with_values(|values| {
                    state
                        .ids
                        .iter()
                        .map(|&row| values.get(row).copied().unwrap_or_default())
                        .collect()
                })
            })
            .collect()
    }

    /// Snapshot of the matching row identifiers in ascending order.
    pub fn ids(&self) -> Vec<RowId> {
        self.state.read().ids.iter().copied().collect()
    }

    /// Number of matching rows.
    pub fn len(&self) -> usize {
        self.state.read().num_results
    }

    /// Returns true if no row matches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the columns this condition was built over.
    pub fn columns(&self) -> Vec<String> {
        self.state.read().cols.clone()
    }

    /// Drops every identifier flagged in `deleted`, returning how many went.
    pub(crate) fn exclude(&self, deleted: &BitSlice) -> usize {
        let mut state = self.state.write();
        let before = state.ids.len();
        state
            .ids
            .retain(|&row| !deleted.get(row).is_some_and(|bit| *bit));
        let removed = before - state.ids.len();
        state.num_results -= removed;
        removed
    }

    fn lock_pair<'a>(
        &'a self,
        other: &'a Condition,
    ) -> (
        RwLockWriteGuard<'a, ConditionState>,
        RwLockReadGuard<'a, ConditionState>,
    ) {
        if (self as *const Self) < (other as *const Self) {
            let mine = self.state.write();
            let theirs = other.state.read();
            (mine, theirs)
        } else {
            let theirs = other.state.read();
            let mine = self.state.write();
            (mine, theirs)
        }
    }
}

fn merge_cols(into: &mut Vec<String>, from: &[String]) {
    for col in from {
        if !into.contains(col) {
            into.push(col.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn setup() -> (Column, Column) {
        let col1 = Column::new("col1", 16);
        col1.load(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let col2 = Column::new("col2", 16);
        col2.load(&[1, 4, 9, 16, 25, 36, 49, 64, 81]);
        (col1, col2)
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : Select & Get
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_basic_select_and_get() {
        let (col1, col2) = setup();
        let c = Condition::new();

        c.select(&col1, 2, 6);

        assert_eq!(c.ids(), vec![1, 2, 3, 4]);
        assert_eq!(c.len(), 4);
        assert_eq!(c.columns(), vec!["col1".to_string()]);
        assert_eq!(c.get(&[&col2]), vec![vec![4, 9, 16, 25]]);
    }

    #[test]
    fn test_select_upper_bound_is_excluded() {
        let (col1, _) = setup();
        let c = Condition::new();

        c.select(&col1, 9, 9);
        assert!(c.is_empty());

        c.select(&col1, 8, 9);
        assert_eq!(c.ids(), vec![7]);
    }

    #[test]
    fn test_select_ignores_spare_capacity() {
        // unused slots are zero-filled and must never match
        let col = Column::new("col", 32);
        col.load(&[5, 6]);
        let c = Condition::new();

        c.select(&col, -10, 10);
        assert_eq!(c.ids(), vec![0, 1]);
    }

    #[test]
    fn test_repeated_select_counts_rows_once() {
        let (col1, _) = setup();
        let c = Condition::new();

        c.select(&col1, 2, 6);
        c.select(&col1, 4, 8);

        assert_eq!(c.ids(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(c.len(), 6);
        assert_eq!(c.columns(), vec!["col1".to_string()]);
    }

    #[test]
    fn test_get_empty_condition() {
        let (col1, col2) = setup();
        let c = Condition::new();

        c.select(&col1, 100, 200);
        assert!(c.get(&[&col1, &col2]).is_empty());
    }

    #[test]
    fn test_get_accepts_shared_columns() {
        let (col1, _) = setup();
        let shared = Arc::new(col1);
        let c = Condition::new();

        c.select(&shared, 1, 3);
        assert_eq!(c.get(&[&shared]), vec![vec![1, 2]]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : Or / And
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_or_condition() {
        let (col1, col2) = setup();
        let c = Condition::new();
        c.select(&col1, 2, 6);
        let c2 = Condition::new();
        c2.select(&col2, 30, 81);
        assert_eq!(c2.ids(), vec![5, 6, 7]);

        c.or(&c2);

        assert_eq!(c.ids(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(c.len(), 7);
        assert_eq!(
            c.get(&[&col1, &col2]),
            vec![
                vec![2, 3, 4, 5, 6, 7, 8],
                vec![4, 9, 16, 25, 36, 49, 64]
            ]
        );
        assert_eq!(c.columns(), vec!["col1".to_string(), "col2".to_string()]);
    }

    #[test]
    fn test_and_condition() {
        let (col1, col2) = setup();
        let c = Condition::new();
        c.select(&col1, 2, 6);
        let c2 = Condition::new();
        c2.select(&col2, 30, 81);

        c.or(&c2);
        c.and(&c2);

        assert_eq!(c.ids(), vec![5, 6, 7]);
        assert_eq!(c.len(), 3);
        assert_eq!(
            c.get(&[&col1, &col2]),
            vec![vec![6, 7, 8], vec![36, 49, 64]]
        );
        // the other operand is untouched
        assert_eq!(c2.ids(), vec![5, 6, 7]);
    }

    #[test]
    fn test_self_combination_is_noop() {
        let (col1, _) = setup();
        let c = Condition::new();
        c.select(&col1, 2, 6);

        c.or(&c);
        c.and(&c);

        assert_eq!(c.ids(), vec![1, 2, 3, 4]);
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn test_exclude_deleted_rows() {
        let (col1, _) = setup();
        let c = Condition::new();
        c.select(&col1, 0, 100);

        let mut deleted = bitvec![0; 3];
        deleted.set(0, true);
        deleted.set(2, true);

        assert_eq!(c.exclude(&deleted), 2);
        assert_eq!(c.ids(), vec![1, 3, 4, 5, 6, 7, 8]);
        assert_eq!(c.len(), 7);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : Concurrency
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_cross_combination_does_not_deadlock() {
        let (col1, col2) = setup();
        let a = Condition::new();
        a.select(&col1, 2, 6);
        let b = Condition::new();
        b.select(&col2, 30, 81);
        a.or(&b);

        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..1_000 {
                    a.or(&b);
                }
            });
            s.spawn(|| {
                for _ in 0..1_000 {
                    b.and(&a);
                }
            });
            s.spawn(|| {
                for _ in 0..1_000 {
                    let _ = a.get(&[&col1]);
                }
            });
        });

        assert_eq!(a.ids(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(a.len(), 7);
        assert_eq!(b.ids(), vec![5, 6, 7]);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_select_during_column_growth() {
        let col = Column::new("grow", 1);
        let c = Condition::new();

        thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2_000 {
                    col.insert(i);
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    c.select(&col, 0, 1_000);
                }
            });
        });

        // every id seen is a valid row whose value matched
        c.select(&col, 0, 1_000);
        assert_eq!(c.ids(), (0..1_000).collect::<Vec<_>>());
    }

    fn condition_from(bits: &[bool]) -> (Column, Condition) {
        let col = Column::new("bits", 4);
        col.load(&bits.iter().map(|&b| b as i64).collect::<Vec<_>>());
        let c = Condition::new();
        c.select(&col, 1, 2);
        (col, c)
    }

    proptest! {
        #[test]
        fn prop_or_is_union(
            a in proptest::collection::vec(any::<bool>(), 0..64),
            b in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let (_, ca) = condition_from(&a);
            let (_, cb) = condition_from(&b);
            let mut expected: HashSet<RowId> = ca.ids().into_iter().collect();
            expected.extend(cb.ids());

            ca.or(&cb);

            let actual: HashSet<RowId> = ca.ids().into_iter().collect();
            prop_assert_eq!(&actual, &expected);
            prop_assert_eq!(ca.len(), expected.len());
        }

        #[test]
        fn prop_and_is_intersection(
            a in proptest::collection::vec(any::<bool>(), 0..64),
            b in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let (_, ca) = condition_from(&a);
            let (_, cb) = condition_from(&b);
            let bs: HashSet<RowId> = cb.ids().into_iter().collect();
            let expected: HashSet<RowId> =
                ca.ids().into_iter().filter(|id| bs.contains(id)).collect();

            ca.and(&cb);

            let actual: HashSet<RowId> = ca.ids().into_iter().collect();
            prop_assert_eq!(&actual, &expected);
            prop_assert_eq!(ca.len(), expected.len());
        }

        #[test]
        fn prop_select_is_half_open(
            values in proptest::collection::vec(-50i64..50, 0..64),
            lower in -60i64..60,
            width in 0i64..40,
        ) {
            let upper = lower + width;
            let col = Column::new("v", 8);
            col.load(&values);
            let c = Condition::new();

            c.select(&col, lower, upper);

            let expected: Vec<RowId> = values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| lower <= v && v < upper)
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(c.ids(), expected);
        }
    }
}
