//! Table-level storage for Heron.
//!
//! This crate provides:
//! - Scoped bump arenas and the execution context that owns them
//! - Row records and positional row storage
//! - Ordered non-unique indexes with same-position search
//! - Table shares with per-index locks, active-index bitmaps and versions
//! - Table handles and the same-row re-read protocol

mod arena;
mod context;
mod handle;
mod index;
mod record;
mod registry;
mod same_row;
mod share;
mod store;

pub use arena::MemoryArena;
pub use context::ExecutionContext;
pub use handle::{HandleState, READ_BUFFER_ROWS, TableHandle};
pub use index::{IndexDef, TableIndex};
pub use record::Record;
pub use registry::ShareRegistry;
pub use same_row::read_same_row;
pub use share::{IndexGuard, TableShare};
pub use store::{InMemoryRowStore, RowStore, StoredRow};
