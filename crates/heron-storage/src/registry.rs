//! Table catalog and the cache of open shares.

use crate::index::IndexDef;
use crate::share::TableShare;
use crate::store::{InMemoryRowStore, RowStore};
use heron_common::{HeronConfig, HeronError, Result, TableId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Catalog entry for one table.
struct TableEntry {
    indexes: Vec<IndexDef>,
    rows: Arc<dyn RowStore>,
}

/// Maps table ids to their definitions and to the share currently open for
/// each.
///
/// A share is created on the first `open_share` of a table and dropped from
/// the registry by `flush_unused` once no handle is bound to it. Handles keep
/// their own reference, so a share outlives every handle bound to it.
///
/// When both maps are locked, `tables` is locked first.
pub struct ShareRegistry {
    config: HeronConfig,
    tables: Mutex<HashMap<TableId, TableEntry>>,
    shares: Mutex<HashMap<TableId, Arc<TableShare>>>,
}

impl ShareRegistry {
    /// Creates an empty registry.
    pub fn new(config: HeronConfig) -> Self {
        Self {
            config,
            tables: Mutex::new(HashMap::new()),
            shares: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HeronConfig {
        &self.config
    }

    /// Registers a table backed by a new in-memory row store.
    pub fn create_table(&self, table_id: TableId, indexes: Vec<IndexDef>) -> Result<()> {
        self.create_table_with_store(table_id, indexes, Arc::new(InMemoryRowStore::new()))
    }

    /// Registers a table backed by `rows`.
    pub fn create_table_with_store(
        &self,
        table_id: TableId,
        indexes: Vec<IndexDef>,
        rows: Arc<dyn RowStore>,
    ) -> Result<()> {
        if indexes.len() > self.config.max_indexes {
            return Err(HeronError::IndexOutOfRange {
                index: indexes.len(),
                max: self.config.max_indexes,
            });
        }
        let mut tables = self.tables.lock();
        if tables.contains_key(&table_id) {
            return Err(HeronError::TableAlreadyExists(table_id.to_string()));
        }
        debug!(table = %table_id, indexes = indexes.len(), "table created");
        tables.insert(table_id, TableEntry { indexes, rows });
        Ok(())
    }

    /// Returns the open share for `table_id`, opening it if needed.
    pub fn open_share(&self, table_id: &TableId) -> Result<Arc<TableShare>> {
        if let Some(share) = self.shares.lock().get(table_id) {
            return Ok(Arc::clone(share));
        }

        // Load outside the shares lock; index loading scans every row.
        let (indexes, rows) = {
            let tables = self.tables.lock();
            let entry = tables
                .get(table_id)
                .ok_or_else(|| HeronError::TableNotFound(table_id.to_string()))?;
            (entry.indexes.clone(), Arc::clone(&entry.rows))
        };
        let share = Arc::new(TableShare::open(
            table_id.clone(),
            indexes,
            Arc::clone(&rows),
            self.config.max_indexes,
        )?);

        // The table may have been dropped or recreated while loading.
        let tables = self.tables.lock();
        match tables.get(table_id) {
            Some(entry) if Arc::ptr_eq(&entry.rows, &rows) => {}
            _ => return Err(HeronError::TableNotFound(table_id.to_string())),
        }
        // Another session may have opened it meanwhile; keep the first one.
        let mut shares = self.shares.lock();
        let share = shares.entry(table_id.clone()).or_insert(share);
        Ok(Arc::clone(share))
    }

    /// Returns the share currently open for `table_id`, without opening one.
    pub fn cached_share(&self, table_id: &TableId) -> Option<Arc<TableShare>> {
        self.shares.lock().get(table_id).cloned()
    }

    /// Removes a table.
    ///
    /// The open share, if any, is evicted and its version bumped so idle
    /// handles bound to it are discarded by the handle cache.
    pub fn drop_table(&self, table_id: &TableId) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.remove(table_id).is_none() {
            return Err(HeronError::TableNotFound(table_id.to_string()));
        }
        if let Some(share) = self.shares.lock().remove(table_id) {
            share.bump_version();
        }
        drop(tables);
        debug!(table = %table_id, "table dropped");
        Ok(())
    }

    /// Drops every open share no handle is bound to. Returns how many.
    ///
    /// A share still referenced outside the registry is kept even with no
    /// bound handle, so a table never has two shares open at once.
    pub fn flush_unused(&self) -> usize {
        let mut shares = self.shares.lock();
        let before = shares.len();
        shares.retain(|_, share| share.refcount() > 0 || Arc::strong_count(share) > 1);
        let flushed = before - shares.len();
        if flushed > 0 {
            debug!(flushed, remaining = shares.len(), "unused shares flushed");
        }
        flushed
    }

    /// Number of registered tables.
    pub fn table_count(&self) -> usize {
        self.tables.lock().len()
    }

    /// Number of open shares.
    pub fn share_count(&self) -> usize {
        self.shares.lock().len()
    }
}
