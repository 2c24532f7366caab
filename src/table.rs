use std::collections::{HashMap, HashSet};
use std::ptr;
use std::sync::Arc;

use bitvec::prelude::*;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::column::{Column, RowId};
use crate::condition::Condition;
use crate::config::Config;
use crate::error::{EntityKind, Error, Result};

/// Projection of a [Condition] through [Table::get].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Names of the requested columns that were still registered, in request order.
    pub columns: Vec<String>,
    /// One vector per entry of `columns`, in ascending row order.
    /// Empty when the condition matched nothing.
    pub values: Vec<Vec<i64>>,
    /// Aggregate of the requested columns that had been deleted, if any.
    pub error: Option<Error>,
}

impl QueryResult {
    /// Returns the projected values, or the error if any column was missing.
    pub fn into_result(self) -> Result<Vec<Vec<i64>>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.values),
        }
    }
}

#[derive(Debug)]
struct TableState {
    cols: HashMap<String, Arc<Column>>,
    /// Common logical length of the row-aligned columns.
    num_rows: usize,
    /// Soft-deleted rows; a set bit excludes the row from every read.
    deletes: BitVec,
}

impl TableState {
    fn create_column(&mut self, name: &str, capacity: usize) -> Result<Arc<Column>> {
        if self.cols.contains_key(name) {
            return Err(Error::collision(EntityKind::Column, name));
        }
        let column = Arc::new(Column::new(name, capacity));
        self.cols.insert(name.to_string(), Arc::clone(&column));
        debug!(column = name, "created column");
        Ok(column)
    }

    fn remove_column(&mut self, name: &str) -> Result<()> {
        match self.cols.remove(name) {
            Some(_) => {
                debug!(column = name, "deleted column");
                Ok(())
            }
            None => Err(Error::not_found(EntityKind::Column, name)),
        }
    }

    /// True if `column` is the very column registered under its name.
    fn is_registered(&self, column: &Column) -> bool {
        self.cols
            .get(column.name())
            .is_some_and(|c| ptr::eq(c.as_ref(), column))
    }
}

/// Returns the first name that appears more than once.
fn find_duplicate<S: AsRef<str>>(names: &[S]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .map(|name| name.as_ref())
        .find(|&name| !seen.insert(name))
}

/// A named collection of row-aligned integer columns.
///
/// The table owns its columns and mediates every predicate evaluated against
/// them. Rows are soft-deleted: their identifiers are recorded and filtered
/// out on read, and never reused.
///
/// Lock order: the table is locked before any condition or column it touches.
///
/// # Example
/// ```
/// use colstore::{Config, Table};
///
/// let table = Table::new("points", Config::default());
/// table
///     .load_columns(
///         &["x", "y"],
///         &[vec![1, 2, 3, 4, 5, 6, 7, 8, 9], vec![1, 4, 9, 16, 25, 36, 49, 64, 81]],
///     )
///     .unwrap();
///
/// let x = table.get_col("x").unwrap();
/// let y = table.get_col("y").unwrap();
/// let cond = table.select(&x, 2, 6).unwrap();
///
/// table.delete_rows(&[1]).unwrap();
/// let result = table.get(&cond, &[&y]);
/// assert_eq!(result.into_result().unwrap(), vec![vec![9, 16, 25]]);
/// ```
#[derive(Debug)]
pub struct Table {
    name: String,
    config: Config,
    state: Mutex<TableState>,
}

impl Table {
    /// Creates an empty table; new columns use `config.column_capacity`.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(TableState {
                cols: HashMap::new(),
                num_rows: 0,
                deletes: BitVec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates and registers an empty column.
    ///
    /// # Errors
    /// Returns [Error::Collision] if a column with that name already exists.
    pub fn create_column(&self, name: &str) -> Result<Arc<Column>> {
        self.state
            .lock()
            .create_column(name, self.config.column_capacity)
    }

    /// Returns the column registered under `name`.
    pub fn get_col(&self, name: &str) -> Option<Arc<Column>> {
        self.state.lock().cols.get(name).cloned()
    }

    /// Names of all registered columns, sorted.
    pub fn list_cols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().cols.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn num_cols(&self) -> usize {
        self.state.lock().cols.len()
    }

    pub fn num_rows(&self) -> usize {
        self.state.lock().num_rows
    }

    /// Returns true if `row` has been soft-deleted.
    pub fn is_deleted(&self, row: RowId) -> bool {
        self.state
            .lock()
            .deletes
            .get(row)
            .is_some_and(|bit| *bit)
    }

    /// Appends one value to each named column and counts one more row.
    ///
    /// Every name is resolved before any column is touched, so a rejected
    /// call leaves the table unchanged.
    ///
    /// # Errors
    /// - [Error::LengthMismatch] if `names` and `values` differ in length.
    /// - [Error::EmptyRow] if no column is named.
    /// - [Error::DuplicateColumn] if a column is named twice.
    /// - [Error::NotFound] naming the first unregistered column.
    pub fn insert_row<S: AsRef<str>>(&self, names: &[S], values: &[i64]) -> Result<()> {
        let mut state = self.state.lock();

        if names.len() != values.len() {
            return Err(Error::LengthMismatch {
                names: names.len(),
                values: values.len(),
            });
        }
        if names.is_empty() {
            return Err(Error::EmptyRow);
        }
        if let Some(name) = find_duplicate(names) {
            return Err(Error::DuplicateColumn(name.to_string()));
        }

        let targets = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                state
                    .cols
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::not_found(EntityKind::Column, name))
            })
            .collect::<Result<Vec<_>>>()?;

        for (column, &value) in targets.iter().zip(values) {
            column.insert(value);
        }
        state.num_rows += 1;

        Ok(())
    }

    /// Bulk (re)populates the named columns, creating the missing ones.
    ///
    /// All value sets must share one length, which must also match the
    /// table's row count unless the table is still empty. Empty `names` and
    /// `columns` is a successful no-op.
    ///
    /// # Errors
    /// - [Error::LengthMismatch] if `names` and `columns` differ in length.
    /// - [Error::DuplicateColumn] if a column is named twice.
    /// - [Error::InconsistentLength] if the value sets disagree with each other
    ///   or with the existing rows. Nothing is modified in that case.
    pub fn load_columns<S, V>(&self, names: &[S], columns: &[V]) -> Result<()>
    where
        S: AsRef<str>,
        V: AsRef<[i64]>,
    {
        let mut state = self.state.lock();

        if names.len() != columns.len() {
            return Err(Error::LengthMismatch {
                names: names.len(),
                values: columns.len(),
            });
        }

        let Some(first) = columns.first() else {
            return Ok(());
        };
        if let Some(name) = find_duplicate(names) {
            return Err(Error::DuplicateColumn(name.to_string()));
        }
        let length = first.as_ref().len();

        if let Some(other) = columns[1..]
            .iter()
            .map(|c| c.as_ref().len())
            .find(|&len| len != length)
        {
            return Err(Error::InconsistentLength {
                expected: length,
                actual: other,
            });
        }

        if state.num_rows != 0 && state.num_rows != length {
            return Err(Error::InconsistentLength {
                expected: state.num_rows,
                actual: length,
            });
        }

        for (name, values) in names.iter().zip(columns) {
            let name = name.as_ref();
            let existing = state.cols.get(name).cloned();
            let column = match existing {
                Some(column) => column,
                None => state.create_column(name, self.config.column_capacity)?,
            };
            column.load(values.as_ref());
        }
        state.num_rows = length;
        debug!(table = %self.name, rows = length, columns = names.len(), "loaded columns");

        Ok(())
    }

    /// Builds a fresh [Condition] matching `lower <= column[i] < upper`.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if `column` is no longer registered in this
    /// table, for instance because it was deleted after the caller fetched it.
    pub fn select(&self, column: &Column, lower: i64, upper: i64) -> Result<Condition> {
        let state = self.state.lock();
        if !state.is_registered(column) {
            return Err(Error::not_found(EntityKind::Column, column.name()));
        }

        let condition = Condition::new();
        condition.select(column, lower, upper);
        Ok(condition)
    }

    /// Projects `condition` onto `columns`, skipping soft-deleted rows.
    ///
    /// Deleted rows are purged from the condition itself. Requested columns
    /// that are no longer registered are left out of the projection and
    /// reported as [Error::ColumnDeleted] in [QueryResult::error].
    ///
    /// The condition lock is released between the purge and the projection,
    /// so an `or` racing this call can bring deleted rows back into the output.
    pub fn get(&self, condition: &Condition, columns: &[&Column]) -> QueryResult {
        let state = self.state.lock();

        let purged = condition.exclude(&state.deletes);
        if purged > 0 {
            debug!(table = %self.name, purged, "purged deleted rows from condition");
        }

        let mut present = Vec::with_capacity(columns.len());
        let mut errors = Vec::new();
        for &column in columns {
            if state.is_registered(column) {
                present.push(column);
            } else {
                warn!(table = %self.name, column = column.name(), "projection on deleted column");
                errors.push(Error::ColumnDeleted(column.name().to_string()));
            }
        }

        QueryResult {
            columns: present.iter().map(|c| c.name().to_string()).collect(),
            values: condition.get(&present),
            error: Error::from_errors(errors).err(),
        }
    }

    /// Removes one column.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no column has that name.
    pub fn delete_column(&self, name: &str) -> Result<()> {
        self.state.lock().remove_column(name)
    }

    /// Removes every column, attempting each one regardless of failures.
    ///
    /// The row count and soft-delete set survive, so row identifiers are
    /// never handed out twice.
    pub fn delete_columns(&self) -> Result<()> {
        let mut state = self.state.lock();
        let names: Vec<String> = state.cols.keys().cloned().collect();
        let errors = names
            .iter()
            .filter_map(|name| state.remove_column(name).err())
            .collect();
        Error::from_errors(errors)
    }

    /// Soft-deletes the given rows.
    ///
    /// Identifiers past the row count are reported as [Error::RowNotFound]
    /// and not recorded; the valid ones are still deleted.
    pub fn delete_rows(&self, rows: &[RowId]) -> Result<()> {
        let mut state = self.state.lock();
        let state = &mut *state;

        if state.deletes.len() < state.num_rows {
            state.deletes.resize(state.num_rows, false);
        }

        let mut errors = Vec::new();
        for &row in rows {
            if row >= state.num_rows {
                warn!(table = %self.name, row, "cannot delete missing row");
                errors.push(Error::RowNotFound(row));
                continue;
            }
            state.deletes.set(row, true);
        }
        debug!(table = %self.name, requested = rows.len(), failed = errors.len(), "deleted rows");

        Error::from_errors(errors)
    }
}
