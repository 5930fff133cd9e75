//! Row storage behind a table share.

use crate::record::Record;
use heron_common::{HeronError, Result, RowPosition};
use parking_lot::RwLock;

/// A stored row slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Column values last written to the slot.
    pub record: Record,
    /// Whether the slot has been deleted.
    pub deleted: bool,
}

/// Positional row storage for one physical table.
///
/// Positions are assigned by `append` and never reused, so a position read
/// earlier keeps naming the same physical row.
pub trait RowStore: Send + Sync {
    /// Appends a row and returns its position.
    fn append(&self, record: &Record) -> Result<RowPosition>;

    /// Reads the slot at `position`.
    ///
    /// Returns `EndOfFile` for positions past the last slot.
    fn read(&self, position: RowPosition) -> Result<StoredRow>;

    /// Overwrites the row at `position`.
    fn update(&self, position: RowPosition, record: &Record) -> Result<()>;

    /// Marks the slot at `position` as deleted.
    fn mark_deleted(&self, position: RowPosition) -> Result<()>;

    /// Number of slots, deleted ones included.
    fn len(&self) -> u64;

    /// Returns true if no row was ever appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory row storage.
///
/// All slots are stored in RAM in a Vec. Positions map directly to Vec
/// indices. Appends take the write lock only for the push, so readers run
/// alongside concurrent inserts.
pub struct InMemoryRowStore {
    slots: RwLock<Vec<StoredRow>>,
}

impl InMemoryRowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    fn slot_index(position: RowPosition) -> Result<usize> {
        if !position.is_valid() {
            return Err(HeronError::KeyNotFound);
        }
        usize::try_from(position.0).map_err(|_| HeronError::EndOfFile)
    }
}

impl Default for InMemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore for InMemoryRowStore {
    fn append(&self, record: &Record) -> Result<RowPosition> {
        let mut slots = self.slots.write();
        let position = RowPosition(slots.len() as u64);
        slots.push(StoredRow {
            record: record.clone(),
            deleted: false,
        });
        Ok(position)
    }

    fn read(&self, position: RowPosition) -> Result<StoredRow> {
        let idx = Self::slot_index(position)?;
        self.slots
            .read()
            .get(idx)
            .cloned()
            .ok_or(HeronError::EndOfFile)
    }

    fn update(&self, position: RowPosition, record: &Record) -> Result<()> {
        let idx = Self::slot_index(position)?;
        let mut slots = self.slots.write();
        match slots.get_mut(idx) {
            Some(slot) if slot.deleted => Err(HeronError::KeyNotFound),
            Some(slot) => {
                slot.record.copy_from(record);
                Ok(())
            }
            None => Err(HeronError::EndOfFile),
        }
    }

    fn mark_deleted(&self, position: RowPosition) -> Result<()> {
        let idx = Self::slot_index(position)?;
        let mut slots = self.slots.write();
        match slots.get_mut(idx) {
            Some(slot) if slot.deleted => Err(HeronError::KeyNotFound),
            Some(slot) => {
                slot.deleted = true;
                Ok(())
            }
            None => Err(HeronError::EndOfFile),
        }
    }

    fn len(&self) -> u64 {
        self.slots.read().len() as u64
    }
}
