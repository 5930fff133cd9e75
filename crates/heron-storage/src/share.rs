//! Per-table shared state: index definitions, per-index locks, active-index
//! bitmap and version stamp.
//!
//! One `TableShare` exists per open physical table and is shared by every
//! handle bound to it. Two lock granularities coexist and are never merged:
//!
//! - one `RwLock` per index guarding that index's entry set
//! - one `RwLock` around the active-index bitmap
//!
//! A reader holds at most one index lock at a time and never holds an index
//! lock while waiting for another, so independent indexes never block each
//! other.
//!
//! Row writes are serialised by a per-share writer mutex, taken before any
//! index lock. Readers never take it, so they keep overlapping with writes
//! when concurrent insert is enabled. Lock order: writer mutex, index lock,
//! active-index bitmap.

use crate::index::{IndexDef, TableIndex};
use crate::record::Record;
use crate::store::RowStore;
use bytes::Bytes;
use heron_common::{
    HeronError, IndexBitmap, IndexId, MAX_INDEXES, Result, RowPosition, TableId,
};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Lock held on one index while searching it.
///
/// Shared when concurrent insert is enabled, exclusive otherwise.
pub enum IndexGuard<'a> {
    Shared(RwLockReadGuard<'a, TableIndex>),
    Exclusive(RwLockWriteGuard<'a, TableIndex>),
}

impl IndexGuard<'_> {
    /// Returns true if the guard is a shared (read) lock.
    pub fn is_shared(&self) -> bool {
        matches!(self, IndexGuard::Shared(_))
    }
}

impl Deref for IndexGuard<'_> {
    type Target = TableIndex;

    fn deref(&self) -> &TableIndex {
        match self {
            IndexGuard::Shared(guard) => guard,
            IndexGuard::Exclusive(guard) => guard,
        }
    }
}

/// Shared metadata and index state for one physical table.
pub struct TableShare {
    /// Table identifier.
    table_id: TableId,
    /// Index definitions, position = index id.
    indexes: Vec<IndexDef>,
    /// One lock per index guarding its entries.
    index_locks: Vec<RwLock<TableIndex>>,
    /// Indexes usable for lookups right now.
    active_indexes: RwLock<IndexBitmap>,
    /// Whether readers may overlap with appends.
    concurrent_insert: AtomicBool,
    /// Bumped on every structural change.
    version: AtomicU64,
    /// Number of handles bound to this share.
    refcount: AtomicU32,
    /// Row storage.
    rows: Arc<dyn RowStore>,
    /// Number of index locks taken, for diagnostics.
    index_lock_acquisitions: AtomicU64,
    /// Held across every row write and index rebuild.
    row_writes: Mutex<()>,
}

impl TableShare {
    /// Opens the share for a table, loading every index from its rows.
    ///
    /// All indexes start active. Fails if the table declares more indexes
    /// than `max_indexes` (itself capped at `MAX_INDEXES`).
    pub fn open(
        table_id: TableId,
        indexes: Vec<IndexDef>,
        rows: Arc<dyn RowStore>,
        max_indexes: usize,
    ) -> Result<Self> {
        let max = max_indexes.min(MAX_INDEXES);
        if indexes.len() > max {
            return Err(HeronError::IndexOutOfRange {
                index: indexes.len(),
                max,
            });
        }

        let index_locks = indexes
            .iter()
            .map(|def| Self::build_index(def, rows.as_ref()).map(RwLock::new))
            .collect::<Result<Vec<_>>>()?;
        let active = IndexBitmap::with_prefix(indexes.len());

        debug!(table = %table_id, indexes = indexes.len(), rows = rows.len(), "share opened");

        Ok(Self {
            table_id,
            indexes,
            index_locks,
            active_indexes: RwLock::new(active),
            concurrent_insert: AtomicBool::new(true),
            version: AtomicU64::new(0),
            refcount: AtomicU32::new(0),
            rows,
            index_lock_acquisitions: AtomicU64::new(0),
            row_writes: Mutex::new(()),
        })
    }

    /// Builds an index from scratch by scanning every live row.
    fn build_index(def: &IndexDef, rows: &dyn RowStore) -> Result<TableIndex> {
        let mut index = TableIndex::new(def.unique);
        for pos in 0..rows.len() {
            let position = RowPosition(pos);
            let row = rows.read(position)?;
            if !row.deleted {
                index.insert(def.build_key(&row.record)?, position)?;
            }
        }
        Ok(index)
    }

    /// Returns the table identifier.
    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    /// Returns the row storage.
    pub fn rows(&self) -> &dyn RowStore {
        self.rows.as_ref()
    }

    /// Number of defined indexes.
    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    #[inline]
    fn check_index(&self, index: IndexId) -> Result<usize> {
        let idx = index.as_usize();
        if idx < self.indexes.len() {
            Ok(idx)
        } else {
            Err(HeronError::IndexOutOfRange {
                index: idx,
                max: self.indexes.len(),
            })
        }
    }

    /// Returns the definition of `index`.
    pub fn index_def(&self, index: IndexId) -> Result<&IndexDef> {
        let idx = self.check_index(index)?;
        Ok(&self.indexes[idx])
    }

    // Reference counting

    /// Binds one more handle. Returns the new count.
    pub fn acquire(&self) -> u32 {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Unbinds one handle. Returns the new count.
    ///
    /// At zero the share may be destroyed once no cache holds it.
    pub fn release(&self) -> u32 {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // Underflow protection: restore to 0
            self.refcount.store(0, Ordering::Release);
            warn!(table = %self.table_id, "share released more often than acquired");
            return 0;
        }
        prev - 1
    }

    /// Returns the number of bound handles.
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    // Versioning

    /// Returns the current version stamp.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Records a structural change. Returns the new version.
    ///
    /// Idle handles opened under an older version are evicted lazily by the
    /// handle cache.
    pub fn bump_version(&self) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(table = %self.table_id, version, "share version bumped");
        version
    }

    // Index availability

    /// Returns a copy of the active-index bitmap.
    pub fn active_indexes(&self) -> IndexBitmap {
        *self.active_indexes.read()
    }

    /// Returns true if `index` may be used for lookups.
    #[inline]
    pub fn is_index_active(&self, index: IndexId) -> bool {
        self.active_indexes.read().is_set(index.as_usize())
    }

    /// Takes `index` out of service, e.g. before a rebuild.
    pub fn disable_index(&self, index: IndexId) -> Result<()> {
        let idx = self.check_index(index)?;
        let _tree = self.write_index(idx);
        self.active_indexes.write().clear(idx);
        debug!(table = %self.table_id, index = idx, "index disabled");
        Ok(())
    }

    /// Rebuilds `index` from the rows and puts it back into service.
    ///
    /// Rows appended while the index was disabled are picked up by the
    /// rebuild. No-op if the index is already active.
    pub fn enable_index(&self, index: IndexId) -> Result<()> {
        let idx = self.check_index(index)?;
        let _writes = self.row_writes.lock();
        let mut tree = self.write_index(idx);
        if self.is_index_active(index) {
            return Ok(());
        }
        *tree = Self::build_index(&self.indexes[idx], self.rows.as_ref())?;
        self.active_indexes.write().set(idx);
        debug!(table = %self.table_id, index = idx, entries = tree.len(), "index enabled");
        Ok(())
    }

    // Concurrent insert

    /// Returns true if readers may overlap with appends.
    pub fn concurrent_insert_enabled(&self) -> bool {
        self.concurrent_insert.load(Ordering::Acquire)
    }

    /// Enables or disables concurrent insert.
    pub fn set_concurrent_insert(&self, enabled: bool) {
        self.concurrent_insert.store(enabled, Ordering::Release);
    }

    // Index locks

    #[inline]
    fn write_index(&self, idx: usize) -> RwLockWriteGuard<'_, TableIndex> {
        self.index_lock_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.index_locks[idx].write()
    }

    /// Locks `index` for a search.
    ///
    /// Takes a shared lock when concurrent insert is enabled and an
    /// exclusive one otherwise. Blocks until granted.
    pub fn lock_index_for_read(&self, index: IndexId) -> Result<IndexGuard<'_>> {
        let idx = self.check_index(index)?;
        self.index_lock_acquisitions.fetch_add(1, Ordering::Relaxed);
        let guard = if self.concurrent_insert_enabled() {
            IndexGuard::Shared(self.index_locks[idx].read())
        } else {
            IndexGuard::Exclusive(self.index_locks[idx].write())
        };
        Ok(guard)
    }

    /// Locks `index` exclusively for modification.
    pub fn lock_index_for_write(&self, index: IndexId) -> Result<RwLockWriteGuard<'_, TableIndex>> {
        let idx = self.check_index(index)?;
        Ok(self.write_index(idx))
    }

    /// Number of index locks taken since the share was opened.
    pub fn index_lock_acquisitions(&self) -> u64 {
        self.index_lock_acquisitions.load(Ordering::Relaxed)
    }

    // Row writes

    fn build_keys(&self, record: &Record) -> Result<Vec<Bytes>> {
        self.indexes.iter().map(|def| def.build_key(record)).collect()
    }

    /// Appends a row and adds it to every active index.
    ///
    /// Each index is locked on its own, one after the other. On a unique-key
    /// violation the entries already added are removed and the appended row
    /// is marked deleted.
    pub fn insert_row(&self, record: &Record) -> Result<RowPosition> {
        let keys = self.build_keys(record)?;
        let _writes = self.row_writes.lock();
        let position = self.rows.append(record)?;

        for (idx, key) in keys.iter().enumerate() {
            let mut tree = self.write_index(idx);
            if !self.active_indexes.read().is_set(idx) {
                continue;
            }
            if let Err(e) = tree.insert(key.clone(), position) {
                drop(tree);
                self.undo_insert(&keys[..idx], position);
                return Err(e);
            }
        }
        Ok(position)
    }

    fn undo_insert(&self, keys: &[Bytes], position: RowPosition) {
        for (idx, key) in keys.iter().enumerate() {
            self.write_index(idx).remove(key, position);
        }
        if let Err(e) = self.rows.mark_deleted(position) {
            warn!(table = %self.table_id, %position, error = %e, "failed to discard row after rejected insert");
        }
    }

    /// Puts `key` back for `position`, logging if that is no longer possible.
    fn restore_entry(&self, tree: &mut TableIndex, idx: usize, key: &Bytes, position: RowPosition) {
        if let Err(e) = tree.insert(key.clone(), position) {
            warn!(table = %self.table_id, index = idx, %position, error = %e, "failed to restore index entry");
        }
    }

    /// Moves the entries of `moved` indexes back from `new_keys` to `old_keys`.
    fn unmove_entries(
        &self,
        moved: &[usize],
        old_keys: &[Bytes],
        new_keys: &[Bytes],
        position: RowPosition,
    ) {
        for &idx in moved.iter().rev() {
            let mut tree = self.write_index(idx);
            // A rebuild on enable picks the row up again.
            if !self.active_indexes.read().is_set(idx) {
                continue;
            }
            tree.remove(&new_keys[idx], position);
            self.restore_entry(&mut tree, idx, &old_keys[idx], position);
        }
    }

    /// Replaces the row at `position`, moving its index entries.
    ///
    /// On failure the row and every active index are left as they were.
    pub fn update_row(&self, position: RowPosition, record: &Record) -> Result<()> {
        let new_keys = self.build_keys(record)?;
        let _writes = self.row_writes.lock();
        let old = self.rows.read(position)?;
        if old.deleted {
            return Err(HeronError::KeyNotFound);
        }
        let old_keys = self.build_keys(&old.record)?;

        let mut moved = Vec::new();
        for idx in 0..self.indexes.len() {
            if old_keys[idx] == new_keys[idx] {
                continue;
            }
            let mut tree = self.write_index(idx);
            if !self.active_indexes.read().is_set(idx) {
                continue;
            }
            tree.remove(&old_keys[idx], position);
            if let Err(e) = tree.insert(new_keys[idx].clone(), position) {
                self.restore_entry(&mut tree, idx, &old_keys[idx], position);
                drop(tree);
                self.unmove_entries(&moved, &old_keys, &new_keys, position);
                return Err(e);
            }
            moved.push(idx);
        }

        if let Err(e) = self.rows.update(position, record) {
            self.unmove_entries(&moved, &old_keys, &new_keys, position);
            return Err(e);
        }
        Ok(())
    }

    /// Deletes the row at `position` and removes its index entries.
    pub fn delete_row(&self, position: RowPosition) -> Result<()> {
        let _writes = self.row_writes.lock();
        let row = self.rows.read(position)?;
        if row.deleted {
            return Err(HeronError::KeyNotFound);
        }
        let keys = self.build_keys(&row.record)?;
        self.rows.mark_deleted(position)?;
        for (idx, key) in keys.iter().enumerate() {
            self.write_index(idx).remove(key, position);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TableShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableShare")
            .field("table_id", &self.table_id)
            .field("indexes", &self.indexes.len())
            .field("active_indexes", &self.active_indexes())
            .field("concurrent_insert", &self.concurrent_insert_enabled())
            .field("version", &self.version())
            .field("refcount", &self.refcount())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRowStore;

    fn people_share() -> TableShare {
        TableShare::open(
            TableId::new("app", "people"),
            vec![
                IndexDef::unique("pk", vec![0]),
                IndexDef::new("by_city", vec![2]),
            ],
            Arc::new(InMemoryRowStore::new()),
            MAX_INDEXES,
        )
        .unwrap()
    }

    fn person(id: &'static str, name: &'static str, city: &'static str) -> Record {
        Record::from_columns([id, name, city])
    }

    fn city_key(share: &TableShare, city: &'static str) -> Bytes {
        share
            .index_def(IndexId(1))
            .unwrap()
            .build_key(&person("", "", city))
            .unwrap()
    }

    #[test]
    fn test_open_all_indexes_active() {
        let share = people_share();
        assert_eq!(share.index_count(), 2);
        assert_eq!(share.active_indexes(), IndexBitmap::with_prefix(2));
        assert_eq!(share.version(), 0);
        assert_eq!(share.refcount(), 0);
        assert!(share.concurrent_insert_enabled());
    }

    #[test]
    fn test_open_rejects_too_many_indexes() {
        let defs = (0..3).map(|i| IndexDef::new(format!("i{i}"), vec![0])).collect();
        let err = TableShare::open(
            TableId::new("app", "wide"),
            defs,
            Arc::new(InMemoryRowStore::new()),
            2,
        )
        .unwrap_err();
        assert!(matches!(err, HeronError::IndexOutOfRange { index: 3, max: 2 }));
    }

    #[test]
    fn test_open_loads_existing_rows() {
        let store = Arc::new(InMemoryRowStore::new());
        store.append(&person("1", "ann", "oslo")).unwrap();
        let gone = store.append(&person("2", "bob", "oslo")).unwrap();
        store.mark_deleted(gone).unwrap();

        let share = TableShare::open(
            TableId::new("app", "people"),
            vec![IndexDef::new("by_city", vec![2])],
            store,
            MAX_INDEXES,
        )
        .unwrap();
        let tree = share.lock_index_for_read(IndexId(0)).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_acquire_release() {
        let share = people_share();
        assert_eq!(share.acquire(), 1);
        assert_eq!(share.acquire(), 2);
        assert_eq!(share.release(), 1);
        assert_eq!(share.release(), 0);
        // Underflow protection
        assert_eq!(share.release(), 0);
        assert_eq!(share.refcount(), 0);
    }

    #[test]
    fn test_bump_version_monotonic() {
        let share = people_share();
        assert_eq!(share.bump_version(), 1);
        assert_eq!(share.bump_version(), 2);
        assert_eq!(share.version(), 2);
    }

    #[test]
    fn test_disable_enable_index_bitmap() {
        let share = people_share();
        assert_eq!(share.active_indexes().to_string(), "0b11");

        share.disable_index(IndexId(1)).unwrap();
        assert_eq!(share.active_indexes().to_string(), "0b1");
        assert!(!share.is_index_active(IndexId(1)));
        assert!(share.is_index_active(IndexId(0)));

        share.enable_index(IndexId(1)).unwrap();
        assert_eq!(share.active_indexes().to_string(), "0b11");
    }

    #[test]
    fn test_disable_out_of_range() {
        let share = people_share();
        assert!(matches!(
            share.disable_index(IndexId(9)),
            Err(HeronError::IndexOutOfRange { index: 9, max: 2 })
        ));
    }

    #[test]
    fn test_enable_rebuilds_rows_inserted_while_disabled() {
        let share = people_share();
        share.insert_row(&person("1", "ann", "oslo")).unwrap();
        share.disable_index(IndexId(1)).unwrap();
        let late = share.insert_row(&person("2", "bob", "oslo")).unwrap();

        {
            let tree = share.lock_index_for_read(IndexId(1)).unwrap();
            assert_eq!(tree.len(), 1);
        }

        share.enable_index(IndexId(1)).unwrap();
        let key = city_key(&share, "oslo");
        let tree = share.lock_index_for_read(IndexId(1)).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.find_same(&key, late), Some(late));
    }

    #[test]
    fn test_lock_mode_follows_concurrent_insert() {
        let share = people_share();
        {
            let guard = share.lock_index_for_read(IndexId(0)).unwrap();
            assert!(guard.is_shared());
        }
        share.set_concurrent_insert(false);
        let guard = share.lock_index_for_read(IndexId(0)).unwrap();
        assert!(!guard.is_shared());
    }

    #[test]
    fn test_lock_acquisitions_counted() {
        let share = people_share();
        let before = share.index_lock_acquisitions();
        drop(share.lock_index_for_read(IndexId(1)).unwrap());
        drop(share.lock_index_for_write(IndexId(0)).unwrap());
        assert_eq!(share.index_lock_acquisitions(), before + 2);
        assert!(share.lock_index_for_read(IndexId(5)).is_err());
        assert_eq!(share.index_lock_acquisitions(), before + 2);
    }

    #[test]
    fn test_readers_on_different_indexes_do_not_block_writer() {
        let share = people_share();
        let _reader = share.lock_index_for_read(IndexId(0)).unwrap();
        // A writer on another index proceeds while index 0 is read-locked.
        let writer = share.lock_index_for_write(IndexId(1)).unwrap();
        assert!(writer.is_empty());
    }

    #[test]
    fn test_insert_row_indexes_duplicates() {
        let share = people_share();
        let a = share.insert_row(&person("1", "ann", "oslo")).unwrap();
        let b = share.insert_row(&person("2", "bob", "oslo")).unwrap();
        let key = city_key(&share, "oslo");

        let tree = share.lock_index_for_read(IndexId(1)).unwrap();
        assert_eq!(tree.positions(&key).collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_insert_row_unique_violation_rolls_back() {
        let share = people_share();
        share.insert_row(&person("1", "ann", "oslo")).unwrap();
        let err = share.insert_row(&person("1", "dup", "rome")).unwrap_err();
        assert!(matches!(err, HeronError::DuplicateKey));

        // Rejected row is discarded and left no index entries.
        assert!(share.rows().read(RowPosition(1)).unwrap().deleted);
        let tree = share.lock_index_for_read(IndexId(1)).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find_first(&city_key(&share, "rome")), None);
    }

    #[test]
    fn test_update_row_moves_entries() {
        let share = people_share();
        let pos = share.insert_row(&person("1", "ann", "oslo")).unwrap();
        share.update_row(pos, &person("1", "ann", "rome")).unwrap();

        let tree = share.lock_index_for_read(IndexId(1)).unwrap();
        assert_eq!(tree.find_first(&city_key(&share, "oslo")), None);
        assert_eq!(tree.find_first(&city_key(&share, "rome")), Some(pos));
        drop(tree);
        assert_eq!(
            share.rows().read(pos).unwrap().record,
            person("1", "ann", "rome")
        );
    }

    #[test]
    fn test_update_row_unique_violation_restores() {
        let share = people_share();
        share.insert_row(&person("1", "ann", "oslo")).unwrap();
        let pos = share.insert_row(&person("2", "bob", "oslo")).unwrap();

        let err = share.update_row(pos, &person("1", "bob", "rome")).unwrap_err();
        assert!(matches!(err, HeronError::DuplicateKey));
        let pk = share.index_def(IndexId(0)).unwrap().build_key(&person("2", "", "")).unwrap();
        let tree = share.lock_index_for_read(IndexId(0)).unwrap();
        assert_eq!(tree.find_first(&pk), Some(pos));
        drop(tree);
        assert_eq!(share.rows().read(pos).unwrap().record, person("2", "bob", "oslo"));
    }

    /// Columns: 0 = id (unique, index 1), 1 = name, 2 = city (index 0).
    fn city_first_share() -> TableShare {
        TableShare::open(
            TableId::new("app", "people"),
            vec![
                IndexDef::new("by_city", vec![2]),
                IndexDef::unique("pk", vec![0]),
            ],
            Arc::new(InMemoryRowStore::new()),
            MAX_INDEXES,
        )
        .unwrap()
    }

    #[test]
    fn test_update_row_failure_moves_earlier_indexes_back() {
        let share = city_first_share();
        let a = share.insert_row(&person("1", "ann", "oslo")).unwrap();
        let b = share.insert_row(&person("2", "bob", "oslo")).unwrap();

        // by_city moves first, then pk rejects the key.
        let err = share.update_row(b, &person("1", "bob", "rome")).unwrap_err();
        assert!(matches!(err, HeronError::DuplicateKey));

        let by_city = share.index_def(IndexId(0)).unwrap();
        let oslo = by_city.build_key(&person("", "", "oslo")).unwrap();
        let rome = by_city.build_key(&person("", "", "rome")).unwrap();
        let tree = share.lock_index_for_read(IndexId(0)).unwrap();
        assert_eq!(tree.positions(&oslo).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.find_first(&rome), None);
        drop(tree);

        let pk = share.index_def(IndexId(1)).unwrap().build_key(&person("2", "", "")).unwrap();
        let tree = share.lock_index_for_read(IndexId(1)).unwrap();
        assert_eq!(tree.find_first(&pk), Some(b));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_update_row_failure_leaves_disabled_index_alone() {
        let share = city_first_share();
        share.insert_row(&person("1", "ann", "oslo")).unwrap();
        let b = share.insert_row(&person("2", "bob", "oslo")).unwrap();
        share.disable_index(IndexId(0)).unwrap();

        assert!(share.update_row(b, &person("1", "bob", "rome")).is_err());
        {
            let tree = share.lock_index_for_read(IndexId(0)).unwrap();
            assert_eq!(tree.len(), 2);
        }

        share.enable_index(IndexId(0)).unwrap();
        let oslo = share
            .index_def(IndexId(0))
            .unwrap()
            .build_key(&person("", "", "oslo"))
            .unwrap();
        let tree = share.lock_index_for_read(IndexId(0)).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.find_same(&oslo, b), Some(b));
    }

    #[test]
    fn test_concurrent_updates_of_one_row_keep_one_entry() {
        const ROUNDS: usize = 2_000;
        let share = Arc::new(
            TableShare::open(
                TableId::new("app", "counters"),
                vec![IndexDef::new("by_value", vec![0])],
                Arc::new(InMemoryRowStore::new()),
                MAX_INDEXES,
            )
            .unwrap(),
        );
        let pos = share.insert_row(&Record::from_columns(["start"])).unwrap();

        let writers: Vec<_> = (0..2)
            .map(|t| {
                let share = Arc::clone(&share);
                std::thread::spawn(move || {
                    for i in 0..ROUNDS {
                        let record = Record::from_columns([format!("t{t}-{i}")]);
                        share.update_row(pos, &record).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let current = share.rows().read(pos).unwrap().record;
        let key = share.index_def(IndexId(0)).unwrap().build_key(&current).unwrap();
        let tree = share.lock_index_for_read(IndexId(0)).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find_same(&key, pos), Some(pos));
    }

    #[test]
    fn test_concurrent_update_and_delete_leave_no_entries() {
        let share = Arc::new(people_share());
        let pos = share.insert_row(&person("1", "ann", "oslo")).unwrap();

        let updater = {
            let share = Arc::clone(&share);
            std::thread::spawn(move || {
                for i in 0.. {
                    let record = Record::from_columns([
                        Bytes::from_static(b"1"),
                        Bytes::from_static(b"ann"),
                        Bytes::from(format!("city-{i}")),
                    ]);
                    match share.update_row(pos, &record) {
                        Ok(()) => continue,
                        Err(HeronError::KeyNotFound) => break,
                        Err(e) => panic!("unexpected update failure: {e}"),
                    }
                }
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(5));
        share.delete_row(pos).unwrap();
        updater.join().unwrap();

        assert!(share.rows().read(pos).unwrap().deleted);
        for index in 0..share.index_count() {
            let tree = share.lock_index_for_read(IndexId(index as u16)).unwrap();
            assert!(tree.is_empty());
        }
    }

    #[test]
    fn test_delete_row() {
        let share = people_share();
        let pos = share.insert_row(&person("1", "ann", "oslo")).unwrap();
        share.delete_row(pos).unwrap();

        assert!(share.rows().read(pos).unwrap().deleted);
        let tree = share.lock_index_for_read(IndexId(1)).unwrap();
        assert!(tree.is_empty());
        drop(tree);
        assert!(matches!(share.delete_row(pos), Err(HeronError::KeyNotFound)));
    }
}
