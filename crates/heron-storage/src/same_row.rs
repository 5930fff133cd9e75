//! Re-reading the row a handle is positioned on, under concurrent inserts.
//!
//! The protocol:
//!
//! 1. A requested index must be active, otherwise `WrongIndex`. No lock is
//!    taken before this check.
//! 2. The handle must have a current row that it has not deleted, otherwise
//!    `KeyNotFound`.
//! 3. Buffered rows are discarded so the positional read sees current
//!    content.
//! 4. With an index, the key is rebuilt from the record buffer and searched
//!    under that index's lock. Among entries with an equal key, the one whose
//!    position equals the handle's position wins. The lock covers only the
//!    search, never the row read.
//! 5. The row is read at the resolved position. A deleted slot becomes
//!    `KeyNotFound`; other failures surface unchanged.

use crate::handle::TableHandle;
use crate::record::Record;
use heron_common::{HeronError, IndexId, Result};
use std::sync::Arc;
use tracing::{debug, trace};

/// Re-reads the handle's current row into `record`.
///
/// With `index`, the row is re-located through that index using the key
/// built from `record`'s current values; without, the handle's last
/// position is used directly. On success `record` holds the row's current
/// values, the handle stays positioned on it, and `index` becomes the
/// handle's last index. State flags other than `DELETED` are left as they
/// were.
pub fn read_same_row(
    handle: &mut TableHandle,
    record: &mut Record,
    index: Option<IndexId>,
) -> Result<()> {
    let share = Arc::clone(handle.share());

    if let Some(index) = index {
        if !share.is_index_active(index) {
            debug!(table = %share.table_id(), index = index.0, "same-row read on inactive index");
            return Err(HeronError::WrongIndex { index: index.0 });
        }
    }

    let last = handle.last_position();
    if !last.is_valid() || handle.state().is_deleted() {
        return Err(HeronError::KeyNotFound);
    }

    handle.resync();

    let position = match index {
        Some(index) => {
            let key = share.index_def(index)?.build_key(record)?;
            let found = {
                let tree = share.lock_index_for_read(index)?;
                // The bitmap may have changed while we waited for the lock.
                if !share.is_index_active(index) {
                    return Err(HeronError::WrongIndex { index: index.0 });
                }
                tree.find_same(&key, last)
            };
            found.ok_or(HeronError::KeyNotFound)?
        }
        None => last,
    };

    let row = handle.fetch_row(position)?;
    if row.deleted {
        return Err(HeronError::KeyNotFound);
    }

    record.copy_from(&row.record);
    handle.set_current(position);
    if let Some(index) = index {
        handle.set_last_index(index);
    }
    trace!(table = %share.table_id(), %position, ?index, "same row re-read");
    Ok(())
}
