use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::common::{Result, SableError};
use crate::storage::table::HeapFile;

/// Registry of open tables, keyed by table id and by name.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<u32, Arc<HeapFile>>>,
    names: RwLock<HashMap<String, u32>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a heap file under `name` and returns its table id.
    /// Fails if the name or the file's id is already taken.
    pub fn add_table(&self, name: impl Into<String>, file: HeapFile) -> Result<u32> {
        let name = name.into();
        let table_id = file.table_id();

        let mut tables = self.tables.write();
        let mut names = self.names.write();
        if names.contains_key(&name) || tables.contains_key(&table_id) {
            return Err(SableError::TableAlreadyExists(name));
        }

        info!(table_id, %name, path = %file.path().display(), "registered table");
        tables.insert(table_id, Arc::new(file));
        names.insert(name, table_id);
        Ok(table_id)
    }

    pub fn table(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(SableError::TableNotFound(table_id))
    }

    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.names.read().get(name).copied()
    }

    /// Ids of every registered table, ascending.
    pub fn table_ids(&self) -> Vec<u32> {
        let mut ids: Vec<_> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
