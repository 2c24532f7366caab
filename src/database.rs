use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::{EntityKind, Error, Result};
use crate::table::Table;

/// A named registry of [Table]s.
///
/// Deleting a table first tears down its columns, then drops the entry.
#[derive(Debug)]
pub struct Database {
    name: String,
    config: Config,
    /// A map of table names to their respective [Table] structures.
    tables: Mutex<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Creates a new, empty database.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            config,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new table in the database.
    ///
    /// # Errors
    /// Returns [Error::Collision] if a table with the same name already exists.
    pub fn create_table(&self, name: &str) -> Result<Arc<Table>> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(Error::collision(EntityKind::Table, name));
        }
        let table = Arc::new(Table::new(name, self.config));
        tables.insert(name.to_string(), Arc::clone(&table));
        debug!(db = %self.name, table = name, "created table");
        Ok(table)
    }

    /// Retrieves a table by name.
    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.lock().get(name).cloned()
    }

    /// Returns the names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn num_tables(&self) -> usize {
        self.tables.lock().len()
    }

    /// Tears down a table's columns and removes it from the database.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the table does not exist, or
    /// [Error::Cascade] if its columns could not all be removed, in which case
    /// the table stays registered.
    pub fn delete_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        drop_table(&mut tables, name)
    }

    /// Deletes every table, attempting each one regardless of failures.
    pub fn delete_tables(&self) -> Result<()> {
        let mut tables = self.tables.lock();
        let names: Vec<String> = tables.keys().cloned().collect();
        let errors = names
            .iter()
            .filter_map(|name| drop_table(&mut tables, name).err())
            .collect();
        Error::from_errors(errors)
    }
}

fn drop_table(tables: &mut HashMap<String, Arc<Table>>, name: &str) -> Result<()> {
    let table = tables
        .get(name)
        .ok_or_else(|| Error::not_found(EntityKind::Table, name))?;

    table.delete_columns().map_err(|source| Error::Cascade {
        kind: EntityKind::Table,
        name: name.to_string(),
        source: Box::new(source),
    })?;

    tables.remove(name);
    debug!(table = name, "deleted table");
    Ok(())
}
