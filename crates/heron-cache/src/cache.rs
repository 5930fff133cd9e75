//! Process-wide cache of idle table handles.

use crate::idle_list::{Chain, IdleList};
use crate::slot::{Slot, SlotId};
use heron_common::{HeronConfig, TableId};
use heron_storage::TableHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleCacheStats {
    /// Handles currently idle in the cache.
    pub idle: usize,
    /// Handles parked via `link` or `release`.
    pub linked: u64,
    /// `take` calls satisfied from the cache.
    pub hits: u64,
    /// `take` calls that found no reusable handle.
    pub misses: u64,
    /// Handles closed because the cache was over capacity.
    pub evicted_lru: u64,
    /// Handles closed because their share version moved on.
    pub evicted_stale: u64,
    /// Handles closed by `clear`.
    pub cleared: u64,
}

struct CacheInner {
    /// Slot storage, indexed by `SlotId`.
    slots: Vec<Slot>,
    /// Indexes of unoccupied slots available for reuse.
    free_slots: Vec<u32>,
    /// All idle handles, most recently unused at the head.
    recency: IdleList,
    /// Idle handles per table, most recently unused at the head.
    by_table: HashMap<TableId, IdleList>,
    stats: HandleCacheStats,
}

impl CacheInner {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            recency: IdleList::new(Chain::Recency),
            by_table: HashMap::new(),
            stats: HandleCacheStats::default(),
        }
    }

    /// Returns true if `slot` still names the handle it was issued for.
    fn is_occupied(&self, slot: SlotId) -> bool {
        self.slots.get(slot.index()).is_some_and(|s| s.holds(slot))
    }

    fn insert(&mut self, handle: TableHandle) -> SlotId {
        let table_id = handle.table_id().clone();
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::empty());
                (self.slots.len() - 1) as u32
            }
        };
        let id = SlotId::new(index, self.slots[index as usize].generation());
        self.slots[id.index()].handle = Some(handle);
        self.recency.push_front(&mut self.slots, id);
        self.by_table
            .entry(table_id)
            .or_insert_with(|| IdleList::new(Chain::Table))
            .push_front(&mut self.slots, id);
        self.stats.linked += 1;
        id
    }

    fn detach(&mut self, slot: SlotId) -> Option<TableHandle> {
        if !self.is_occupied(slot) {
            return None;
        }
        let table_id = self.slots[slot.index()].handle.as_ref()?.table_id().clone();
        self.recency.remove(&mut self.slots, slot);
        if let Some(list) = self.by_table.get_mut(&table_id) {
            list.remove(&mut self.slots, slot);
            if list.is_empty() {
                self.by_table.remove(&table_id);
            }
        }
        self.free_slots.push(slot.index() as u32);
        self.slots[slot.index()].vacate()
    }

    fn touch(&mut self, slot: SlotId) -> bool {
        if !self.is_occupied(slot) {
            return false;
        }
        let Some(table_id) = self.slots[slot.index()]
            .handle
            .as_ref()
            .map(|h| h.table_id().clone())
        else {
            return false;
        };
        self.recency.move_to_front(&mut self.slots, slot);
        if let Some(list) = self.by_table.get_mut(&table_id) {
            list.move_to_front(&mut self.slots, slot);
        }
        true
    }

    /// Detaches least recently unused handles until at most `max_idle` remain.
    fn evict_lru(&mut self, max_idle: usize, evicted: &mut Vec<TableHandle>) {
        while self.recency.len() > max_idle {
            let Some(victim) = self.recency.back() else {
                break;
            };
            if let Some(handle) = self.detach(victim) {
                evicted.push(handle);
                self.stats.evicted_lru += 1;
            }
        }
    }
}

/// Cache of idle table handles shared by all sessions.
///
/// Holds at most `max_idle` handles, evicting the least recently unused one
/// first. Every operation runs under one mutex; evicted handles are closed
/// after it is released. Closing a handle unbinds it from its share.
pub struct HandleCache {
    max_idle: usize,
    inner: Mutex<CacheInner>,
}

impl HandleCache {
    /// Creates a cache sized from `config.max_idle_handles`.
    pub fn new(config: &HeronConfig) -> Self {
        Self::with_max_idle(config.max_idle_handles)
    }

    /// Creates a cache holding at most `max_idle` idle handles.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            max_idle,
            inner: Mutex::new(CacheInner::new()),
        }
    }

    /// Returns the idle-handle bound applied by `release`.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Parks `handle` as the most recently unused entry.
    ///
    /// Does not enforce the idle bound; see `release`.
    pub fn link(&self, handle: TableHandle) -> SlotId {
        let mut inner = self.inner.lock();
        let slot = inner.insert(handle);
        trace!(%slot, idle = inner.recency.len(), "handle linked");
        slot
    }

    /// Removes the handle in `slot` from the cache and hands it back.
    pub fn unlink(&self, slot: SlotId) -> Option<TableHandle> {
        let handle = self.inner.lock().detach(slot);
        if handle.is_some() {
            trace!(%slot, "handle unlinked");
        }
        handle
    }

    /// Marks the handle in `slot` as the most recently unused one.
    ///
    /// Returns false if the slot holds no handle.
    pub fn relink(&self, slot: SlotId) -> bool {
        self.inner.lock().touch(slot)
    }

    /// Closes least recently unused handles until at most `max_idle` remain.
    ///
    /// Returns the number of handles closed.
    pub fn cull(&self, max_idle: usize) -> usize {
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.evict_lru(max_idle, &mut evicted);
        }
        let count = evicted.len();
        drop(evicted);
        if count > 0 {
            debug!(closed = count, max_idle, "idle handles culled");
        }
        count
    }

    /// Closes every idle handle whose share version differs from the one it
    /// was opened with.
    ///
    /// Returns the number of handles closed.
    pub fn cull_by_version(&self) -> usize {
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock();
            let stale: Vec<SlotId> = inner
                .recency
                .iter(&inner.slots)
                .filter(|id| {
                    inner.slots[id.index()]
                        .handle
                        .as_ref()
                        .is_some_and(|h| h.is_stale())
                })
                .collect();
            for slot in stale {
                if let Some(handle) = inner.detach(slot) {
                    evicted.push(handle);
                }
            }
            inner.stats.evicted_stale += evicted.len() as u64;
        }
        let count = evicted.len();
        drop(evicted);
        if count > 0 {
            debug!(closed = count, "stale handles culled");
        }
        count
    }

    /// Closes every idle handle.
    pub fn clear(&self) -> usize {
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock();
            while let Some(slot) = inner.recency.front() {
                if let Some(handle) = inner.detach(slot) {
                    evicted.push(handle);
                }
            }
            inner.stats.cleared += evicted.len() as u64;
        }
        let count = evicted.len();
        drop(evicted);
        if count > 0 {
            debug!(closed = count, "handle cache cleared");
        }
        count
    }

    /// Takes the most recently unused idle handle of `table_id`.
    ///
    /// Stale handles found on the way are closed. The returned handle has
    /// its position, index and state cleared.
    pub fn take(&self, table_id: &TableId) -> Option<TableHandle> {
        let mut stale = Vec::new();
        let found = {
            let mut inner = self.inner.lock();
            let mut found = None;
            while let Some(slot) = inner.by_table.get(table_id).and_then(|l| l.front()) {
                let Some(handle) = inner.detach(slot) else {
                    break;
                };
                if handle.is_stale() {
                    inner.stats.evicted_stale += 1;
                    stale.push(handle);
                } else {
                    found = Some(handle);
                    break;
                }
            }
            if found.is_some() {
                inner.stats.hits += 1;
            } else {
                inner.stats.misses += 1;
            }
            found
        };
        if !stale.is_empty() {
            debug!(table = %table_id, closed = stale.len(), "stale handles closed on take");
        }
        drop(stale);

        let mut handle = found?;
        handle.reset();
        trace!(table = %table_id, "handle reused");
        Some(handle)
    }

    /// Returns a handle to the cache at the end of a statement.
    ///
    /// Stale handles are closed instead of parked. The idle bound is enforced
    /// afterwards, which may close this very handle when `max_idle` is zero.
    /// Returns the slot if the handle is still cached.
    pub fn release(&self, handle: TableHandle) -> Option<SlotId> {
        if handle.is_stale() {
            trace!(table = %handle.table_id(), "stale handle closed on release");
            self.inner.lock().stats.evicted_stale += 1;
            return None;
        }
        let mut evicted = Vec::new();
        let slot = {
            let mut inner = self.inner.lock();
            let slot = inner.insert(handle);
            inner.evict_lru(self.max_idle, &mut evicted);
            inner.is_occupied(slot).then_some(slot)
        };
        if !evicted.is_empty() {
            debug!(closed = evicted.len(), max_idle = self.max_idle, "idle handles culled");
        }
        drop(evicted);
        slot
    }

    /// Returns true if `slot` holds an idle handle.
    pub fn contains(&self, slot: SlotId) -> bool {
        self.inner.lock().is_occupied(slot)
    }

    /// Number of idle handles.
    pub fn idle_count(&self) -> usize {
        self.inner.lock().recency.len()
    }

    /// Number of idle handles bound to `table_id`.
    pub fn idle_count_for(&self, table_id: &TableId) -> usize {
        self.inner
            .lock()
            .by_table
            .get(table_id)
            .map_or(0, |l| l.len())
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> HandleCacheStats {
        let inner = self.inner.lock();
        HandleCacheStats {
            idle: inner.recency.len(),
            ..inner.stats
        }
    }
}

impl std::fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("HandleCache")
            .field("max_idle", &self.max_idle)
            .field("idle", &inner.recency.len())
            .field("tables", &inner.by_table.len())
            .field("slots", &inner.slots.len())
            .finish()
    }
}
