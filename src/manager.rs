use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::database::Database;
use crate::error::{EntityKind, Error, Result};

/// The top-level registry of [Database]s.
///
/// Lock order across the hierarchy is manager, database, table, condition,
/// column; no operation ever locks an outer entity while holding an inner one.
///
/// # Example
/// ```
/// use colstore::Manager;
///
/// let manager = Manager::new();
/// let db = manager.create_db("analytics").unwrap();
/// let table = db.create_table("events").unwrap();
/// table.create_column("ts").unwrap();
/// table.insert_row(&["ts"], &[1_700_000_000]).unwrap();
///
/// manager.delete_db("analytics").unwrap();
/// assert!(manager.get_db("analytics").is_none());
/// assert_eq!(table.num_cols(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Manager {
    config: Config,
    dbs: Mutex<HashMap<String, Arc<Database>>>,
}

impl Manager {
    /// Creates a manager using the default [Config].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose databases, tables and columns use `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            dbs: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Creates a new database.
    ///
    /// # Errors
    /// Returns [Error::Collision] if a database with the same name already exists.
    pub fn create_db(&self, name: &str) -> Result<Arc<Database>> {
        let mut dbs = self.dbs.lock();
        if dbs.contains_key(name) {
            return Err(Error::collision(EntityKind::Database, name));
        }
        let db = Arc::new(Database::new(name, self.config));
        dbs.insert(name.to_string(), Arc::clone(&db));
        debug!(db = name, "created database");
        Ok(db)
    }

    /// Retrieves a database by name.
    pub fn get_db(&self, name: &str) -> Option<Arc<Database>> {
        self.dbs.lock().get(name).cloned()
    }

    /// Returns the names of all databases, sorted.
    pub fn list_dbs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dbs.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn num_dbs(&self) -> usize {
        self.dbs.lock().len()
    }

    /// Deletes every table of a database, then the database itself.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the database does not exist, or
    /// [Error::Cascade] if some of its tables could not be deleted, in which
    /// case the database stays registered.
    pub fn delete_db(&self, name: &str) -> Result<()> {
        let mut dbs = self.dbs.lock();
        let db = dbs
            .get(name)
            .ok_or_else(|| Error::not_found(EntityKind::Database, name))?;

        db.delete_tables().map_err(|source| Error::Cascade {
            kind: EntityKind::Database,
            name: name.to_string(),
            source: Box::new(source),
        })?;

        dbs.remove(name);
        debug!(db = name, "deleted database");
        Ok(())
    }
}
