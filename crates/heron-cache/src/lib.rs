//! Idle table-handle cache for Heron.
//!
//! This crate provides:
//! - A bounded cache of idle handles shared by all sessions
//! - Least-recently-unused eviction in O(1) per handle
//! - Per-table lookup of reusable handles
//! - Discarding of handles whose share version moved on

mod cache;
mod idle_list;
mod slot;

pub use cache::{HandleCache, HandleCacheStats};
pub use slot::SlotId;
