//! An in-memory columnar store of 64-bit integer columns.
//!
//! Entities nest as [Manager] → [Database] → [Table] → [Column]. Callers
//! range-select a table's columns into [Condition]s, combine them with
//! `or`/`and`, and project them back through [Table::get], which also hides
//! soft-deleted rows.

pub mod column;
pub mod condition;
pub mod config;
pub mod database;
pub mod error;
pub mod manager;
pub mod table;

pub use column::{Column, RowId};
pub use condition::Condition;
pub use config::{Config, DEFAULT_COLUMN_CAPACITY};
pub use database::Database;
pub use error::{EntityKind, Error, Result};
pub use manager::Manager;
pub use table::{QueryResult, Table};
