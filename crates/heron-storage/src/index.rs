//! Index definitions and the ordered per-index entry set.

use crate::record::Record;
use bytes::{BufMut, Bytes, BytesMut};
use heron_common::{HeronError, Result, RowPosition};
use std::collections::BTreeSet;

/// Definition of one index over a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name, for diagnostics.
    pub name: String,
    /// Record columns forming the key, in key-part order.
    pub columns: Vec<usize>,
    /// Whether two rows may share a key.
    pub unique: bool,
}

impl IndexDef {
    /// Creates a non-unique index definition.
    pub fn new(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Creates a unique index definition.
    pub fn unique(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            unique: true,
            ..Self::new(name, columns)
        }
    }

    /// Builds the search key for `record`.
    ///
    /// Each key part is written as a little-endian u32 length followed by the
    /// column bytes, so distinct column splits never produce the same key.
    pub fn build_key(&self, record: &Record) -> Result<Bytes> {
        let mut key = BytesMut::new();
        for &column in &self.columns {
            let value = record
                .column(column)
                .ok_or(HeronError::ColumnNotFound(column))?;
            key.put_u32_le(value.len() as u32);
            key.put_slice(value);
        }
        Ok(key.freeze())
    }

    /// Builds the search key from `parts`, a record holding only the key
    /// parts in key-part order (part `i` in column `i`).
    ///
    /// Produces the same key as [`build_key`](Self::build_key) on a full row
    /// with those values in the indexed columns.
    pub fn build_search_key(&self, parts: &Record) -> Result<Bytes> {
        let mut key = BytesMut::new();
        for part in 0..self.columns.len() {
            let value = parts.column(part).ok_or(HeronError::ColumnNotFound(part))?;
            key.put_u32_le(value.len() as u32);
            key.put_slice(value);
        }
        Ok(key.freeze())
    }
}

/// Ordered multiset of `(key, position)` entries for one index.
///
/// Entries with equal keys are ordered by row position.
#[derive(Debug, Default)]
pub struct TableIndex {
    entries: BTreeSet<(Bytes, RowPosition)>,
    unique: bool,
}

impl TableIndex {
    /// Creates an empty index.
    pub fn new(unique: bool) -> Self {
        Self {
            entries: BTreeSet::new(),
            unique,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Positions stored under `key`, in ascending position order.
    pub fn positions<'a>(&'a self, key: &Bytes) -> impl Iterator<Item = RowPosition> + 'a {
        self.entries
            .range((key.clone(), RowPosition(0))..=(key.clone(), RowPosition::NONE))
            .map(|(_, pos)| *pos)
    }

    /// Adds an entry.
    ///
    /// Re-adding an existing `(key, position)` pair is a no-op. A unique index
    /// rejects a key already stored for another position.
    pub fn insert(&mut self, key: Bytes, position: RowPosition) -> Result<()> {
        if self.unique && self.positions(&key).any(|p| p != position) {
            return Err(HeronError::DuplicateKey);
        }
        self.entries.insert((key, position));
        Ok(())
    }

    /// Removes an entry, returning whether it was present.
    pub fn remove(&mut self, key: &Bytes, position: RowPosition) -> bool {
        self.entries.remove(&(key.clone(), position))
    }

    /// First position stored under `key`.
    pub fn find_first(&self, key: &Bytes) -> Option<RowPosition> {
        self.positions(key).next()
    }

    /// Exact-match search with same-position tie-break.
    ///
    /// Among the entries matching `key`, returns the one whose position is
    /// `position`, not merely the first duplicate.
    pub fn find_same(&self, key: &Bytes, position: RowPosition) -> Option<RowPosition> {
        self.positions(key).find(|p| *p == position)
    }
}
