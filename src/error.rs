use std::fmt;

use thiserror::Error;

use crate::column::RowId;

/// Result type alias using the store's [Error] type.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of named entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Database,
    Table,
    Column,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Table => write!(f, "table"),
            Self::Column => write!(f, "column"),
        }
    }
}

/// Every failure the store can report.
///
/// Single-item validation failures abort the operation without side effects.
/// Multi-item operations collect one error per failing item into
/// [Error::Partial] and still attempt every item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("cannot create {kind} {name:?}: already exists")]
    Collision { kind: EntityKind, name: String },

    #[error("{kind} {name:?} does not exist")]
    NotFound { kind: EntityKind, name: String },

    #[error("row {0} does not exist")]
    RowNotFound(RowId),

    #[error("cannot fetch column {0:?}: column deleted")]
    ColumnDeleted(String),

    #[error("number of column names does not match number of values: {names} != {values}")]
    LengthMismatch { names: usize, values: usize },

    #[error("column {0:?} is named more than once")]
    DuplicateColumn(String),

    #[error("cannot insert a row without columns")]
    EmptyRow,

    #[error("inconsistent column lengths: expected {expected}, got {actual}")]
    InconsistentLength { expected: usize, actual: usize },

    #[error("cannot delete {kind} {name:?}: {source}")]
    Cascade {
        kind: EntityKind,
        name: String,
        source: Box<Error>,
    },

    #[error("{} errors occurred: {}", .0.len(), join(.0))]
    Partial(Vec<Error>),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub(crate) fn collision(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::Collision {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Collapses per-item failures into a single result.
    ///
    /// No errors is `Ok(())`, exactly one error is returned as-is and anything
    /// more is wrapped in [Error::Partial].
    pub fn from_errors(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Partial(errors)),
        }
    }

    /// Returns the individual failures carried by this error.
    ///
    /// Nested aggregates are flattened; a non-aggregate error yields itself.
    pub fn errors(&self) -> Vec<&Error> {
        match self {
            Self::Partial(errors) => errors.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }
}
