//! Slots parking idle handles.

use crate::idle_list::{Chain, Linked, Links};
use heron_storage::TableHandle;

/// Identifier of a slot in the handle cache.
///
/// Carries the slot's generation at the time the handle was parked, so an
/// id kept after its handle left the cache never names a later occupant of
/// the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    /// Invalid slot ID.
    pub const INVALID: SlotId = SlotId {
        index: u32::MAX,
        generation: 0,
    };

    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns true if this is a valid slot ID.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.index != Self::INVALID.index
    }

    /// Generation of the slot this ID was issued for.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot:{}@{}", self.index, self.generation)
    }
}

/// A parked handle and its positions in the idle chains.
///
/// The handle itself carries no cache bookkeeping; the links live here.
pub(crate) struct Slot {
    pub(crate) handle: Option<TableHandle>,
    /// Bumped each time the slot is vacated.
    generation: u32,
    recency: Links,
    table: Links,
}

impl Slot {
    pub(crate) fn empty() -> Self {
        Self {
            handle: None,
            generation: 0,
            recency: Links::UNLINKED,
            table: Links::UNLINKED,
        }
    }

    /// Returns true if the slot holds the handle `id` was issued for.
    #[inline]
    pub(crate) fn holds(&self, id: SlotId) -> bool {
        self.handle.is_some() && self.generation == id.generation
    }

    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Empties the slot and retires its current generation.
    pub(crate) fn vacate(&mut self) -> Option<TableHandle> {
        self.generation = self.generation.wrapping_add(1);
        self.handle.take()
    }
}

impl Linked for Slot {
    #[inline]
    fn links(&self, chain: Chain) -> &Links {
        match chain {
            Chain::Recency => &self.recency,
            Chain::Table => &self.table,
        }
    }

    #[inline]
    fn links_mut(&mut self, chain: Chain) -> &mut Links {
        match chain {
            Chain::Recency => &mut self.recency,
            Chain::Table => &mut self.table,
        }
    }
}
