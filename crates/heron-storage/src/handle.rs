//! One session's open view of a table.

use crate::record::Record;
use crate::share::TableShare;
use crate::store::StoredRow;
use heron_common::{HeronError, IndexId, Result, RowPosition, TableId};
use std::sync::Arc;
use tracing::{debug, trace};

/// Number of rows a sequential scan reads ahead into the handle's buffer.
pub const READ_BUFFER_ROWS: u64 = 64;

/// Flags describing a handle's state relative to the underlying table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleState(pub u8);

impl HandleState {
    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The table was modified through this handle.
    pub const CHANGED: u8 = 0x01;
    /// The current row was modified through this handle.
    pub const ROW_CHANGED: u8 = 0x02;
    /// The row at the current position no longer exists.
    pub const DELETED: u8 = 0x04;

    /// Returns true if every bit of `flag` is set.
    #[inline]
    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Sets or clears `flag`.
    #[inline]
    pub fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Returns true if the deleted flag is set.
    pub fn is_deleted(&self) -> bool {
        self.contains(Self::DELETED)
    }

    /// Returns true if the changed flag is set.
    pub fn is_changed(&self) -> bool {
        self.contains(Self::CHANGED)
    }

    /// Returns true if the row-changed flag is set.
    pub fn is_row_changed(&self) -> bool {
        self.contains(Self::ROW_CHANGED)
    }
}

/// Rows read ahead by a sequential scan.
struct ReadBuffer {
    start: u64,
    rows: Vec<StoredRow>,
}

/// An open table handle.
///
/// A handle is owned by exactly one session while in use, or parked in the
/// handle cache while idle. Dropping it closes it and unbinds it from its
/// share.
pub struct TableHandle {
    /// Share this handle is bound to.
    share: Arc<TableShare>,
    /// Share version observed when the handle was opened.
    version: u64,
    /// Position of the last row read, or `RowPosition::NONE`.
    last_position: RowPosition,
    /// Index used by the last keyed read.
    last_index: Option<IndexId>,
    /// State flags.
    state: HandleState,
    /// Scan read-ahead; may be older than the row store.
    read_buffer: Option<ReadBuffer>,
    /// Next slot a sequential scan looks at.
    scan_cursor: u64,
}

impl TableHandle {
    /// Opens a handle bound to `share`.
    pub fn open(share: Arc<TableShare>) -> Self {
        let refcount = share.acquire();
        let version = share.version();
        trace!(table = %share.table_id(), version, refcount, "handle opened");
        Self {
            share,
            version,
            last_position: RowPosition::NONE,
            last_index: None,
            state: HandleState::empty(),
            read_buffer: None,
            scan_cursor: 0,
        }
    }

    /// Returns the share this handle is bound to.
    #[inline]
    pub fn share(&self) -> &Arc<TableShare> {
        &self.share
    }

    /// Returns the table identifier.
    #[inline]
    pub fn table_id(&self) -> &TableId {
        self.share.table_id()
    }

    /// Share version observed when the handle was opened.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the share changed structurally since the handle was opened.
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.version != self.share.version()
    }

    /// Position of the last row read.
    #[inline]
    pub fn last_position(&self) -> RowPosition {
        self.last_position
    }

    /// Index used by the last keyed read.
    #[inline]
    pub fn last_index(&self) -> Option<IndexId> {
        self.last_index
    }

    /// Returns the state flags.
    #[inline]
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Returns mutable access to the state flags.
    pub fn state_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }

    /// Returns true if the handle holds scan read-ahead.
    pub fn has_buffered_rows(&self) -> bool {
        self.read_buffer.is_some()
    }

    /// Discards buffered rows so the next positional read sees current content.
    pub fn resync(&mut self) {
        self.read_buffer = None;
    }

    /// Clears position, index and state so the handle can serve a new statement.
    pub fn reset(&mut self) {
        self.last_position = RowPosition::NONE;
        self.last_index = None;
        self.state = HandleState::empty();
        self.read_buffer = None;
        self.scan_cursor = 0;
    }

    #[inline]
    fn buffered_row(&self, position: RowPosition) -> Option<&StoredRow> {
        let buffer = self.read_buffer.as_ref()?;
        let offset = position.0.checked_sub(buffer.start)?;
        buffer.rows.get(usize::try_from(offset).ok()?)
    }

    fn fill_read_buffer(&mut self, start: RowPosition) -> Result<()> {
        let rows = self.share.rows();
        let end = rows.len().min(start.0.saturating_add(READ_BUFFER_ROWS));
        if start.0 >= end {
            return Err(HeronError::EndOfFile);
        }
        let buffered = (start.0..end)
            .map(|pos| rows.read(RowPosition(pos)))
            .collect::<Result<Vec<_>>>()?;
        self.read_buffer = Some(ReadBuffer {
            start: start.0,
            rows: buffered,
        });
        Ok(())
    }

    /// Reads the slot at `position`, from the read buffer when it covers it.
    pub(crate) fn fetch_row(&self, position: RowPosition) -> Result<StoredRow> {
        if let Some(row) = self.buffered_row(position) {
            return Ok(row.clone());
        }
        self.share.rows().read(position)
    }

    /// Makes `position` the current row.
    pub(crate) fn set_current(&mut self, position: RowPosition) {
        self.last_position = position;
        self.state.set(HandleState::DELETED, false);
    }

    pub(crate) fn set_last_index(&mut self, index: IndexId) {
        self.last_index = Some(index);
    }

    /// Reads the row at `position` into `record` and makes it current.
    ///
    /// Served from scan read-ahead when it covers `position`; call
    /// [`resync`](Self::resync) first to observe concurrent changes.
    pub fn read_at(&mut self, position: RowPosition, record: &mut Record) -> Result<()> {
        let row = self.fetch_row(position)?;
        if row.deleted {
            return Err(HeronError::KeyNotFound);
        }
        record.copy_from(&row.record);
        self.set_current(position);
        Ok(())
    }

    /// Positions on the first row whose `index` key matches `key_record`.
    ///
    /// `key_record` holds only the key parts, in key-part order: column `i`
    /// is the value of the index's `i`-th key column, whatever that column's
    /// position in the row.
    pub fn index_read(
        &mut self,
        index: IndexId,
        key_record: &Record,
        record: &mut Record,
    ) -> Result<()> {
        let share = Arc::clone(&self.share);
        if !share.is_index_active(index) {
            debug!(table = %share.table_id(), index = index.0, "lookup on inactive index");
            return Err(HeronError::WrongIndex { index: index.0 });
        }
        let key = share.index_def(index)?.build_search_key(key_record)?;
        let found = {
            let tree = share.lock_index_for_read(index)?;
            if !share.is_index_active(index) {
                return Err(HeronError::WrongIndex { index: index.0 });
            }
            tree.find_first(&key)
        };
        let position = found.ok_or(HeronError::KeyNotFound)?;

        self.resync();
        self.read_at(position, record)?;
        self.set_last_index(index);
        Ok(())
    }

    /// Restarts sequential scanning at the first slot.
    pub fn scan_init(&mut self) {
        self.scan_cursor = 0;
        self.resync();
    }

    /// Reads the next live row of a sequential scan.
    ///
    /// Returns `EndOfFile` once every slot has been visited.
    pub fn scan_next(&mut self, record: &mut Record) -> Result<()> {
        loop {
            let position = RowPosition(self.scan_cursor);
            let row = match self.buffered_row(position) {
                Some(row) => row.clone(),
                None => {
                    self.fill_read_buffer(position)?;
                    continue;
                }
            };
            self.scan_cursor += 1;
            if row.deleted {
                continue;
            }
            record.copy_from(&row.record);
            self.set_current(position);
            return Ok(());
        }
    }

    #[inline]
    fn current_row(&self) -> Result<RowPosition> {
        if !self.last_position.is_valid() || self.state.is_deleted() {
            return Err(HeronError::KeyNotFound);
        }
        Ok(self.last_position)
    }

    /// Inserts `record` and makes it the current row.
    pub fn insert(&mut self, record: &Record) -> Result<RowPosition> {
        let position = self.share.insert_row(record)?;
        self.state.set(HandleState::CHANGED, true);
        self.set_current(position);
        Ok(position)
    }

    /// Replaces the current row with `record`.
    pub fn update_current(&mut self, record: &Record) -> Result<()> {
        let position = self.current_row()?;
        self.share.update_row(position, record)?;
        self.state
            .set(HandleState::CHANGED | HandleState::ROW_CHANGED, true);
        self.resync();
        Ok(())
    }

    /// Deletes the current row.
    pub fn delete_current(&mut self) -> Result<()> {
        let position = self.current_row()?;
        self.share.delete_row(position)?;
        self.state.set(HandleState::CHANGED | HandleState::DELETED, true);
        self.resync();
        Ok(())
    }

    /// Re-reads the current row, optionally re-locating it through `index`.
    ///
    /// See [`read_same_row`](crate::same_row::read_same_row).
    pub fn read_same(&mut self, record: &mut Record, index: Option<IndexId>) -> Result<()> {
        crate::same_row::read_same_row(self, record, index)
    }
}

impl Drop for TableHandle {
    fn drop(&mut self) {
        let refcount = self.share.release();
        trace!(table = %self.share.table_id(), refcount, "handle closed");
    }
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("table_id", self.table_id())
            .field("version", &self.version)
            .field("last_position", &self.last_position)
            .field("last_index", &self.last_index)
            .field("state", &self.state)
            .finish()
    }
}
