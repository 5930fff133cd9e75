//! Doubly-linked lists threaded through slot indices.
//!
//! A slot can sit on several chains at once (all idle handles, and the idle
//! handles of one table); each chain has its own `Links` in the slot. Every
//! operation is O(1) except iteration.

use crate::slot::SlotId;

/// Which set of links a list uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chain {
    /// Every idle handle, most recently unused first.
    Recency,
    /// Idle handles of one table, most recently unused first.
    Table,
}

/// Neighbours of a slot on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) prev: SlotId,
    pub(crate) next: SlotId,
}

impl Links {
    pub(crate) const UNLINKED: Links = Links {
        prev: SlotId::INVALID,
        next: SlotId::INVALID,
    };
}

/// Slot types carrying links for each chain.
pub(crate) trait Linked {
    fn links(&self, chain: Chain) -> &Links;
    fn links_mut(&mut self, chain: Chain) -> &mut Links;
}

/// Head, tail and length of one chain.
#[derive(Debug)]
pub(crate) struct IdleList {
    chain: Chain,
    head: SlotId,
    tail: SlotId,
    len: usize,
}

impl IdleList {
    pub(crate) fn new(chain: Chain) -> Self {
        Self {
            chain,
            head: SlotId::INVALID,
            tail: SlotId::INVALID,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently unused slot.
    #[inline]
    pub(crate) fn front(&self) -> Option<SlotId> {
        self.head.is_valid().then_some(self.head)
    }

    /// Least recently unused slot.
    #[inline]
    pub(crate) fn back(&self) -> Option<SlotId> {
        self.tail.is_valid().then_some(self.tail)
    }

    /// Links `id` at the head. `id` must not be on this chain.
    pub(crate) fn push_front<S: Linked>(&mut self, slots: &mut [S], id: SlotId) {
        let chain = self.chain;
        let old_head = self.head;
        *slots[id.index()].links_mut(chain) = Links {
            prev: SlotId::INVALID,
            next: old_head,
        };
        if old_head.is_valid() {
            slots[old_head.index()].links_mut(chain).prev = id;
        } else {
            self.tail = id;
        }
        self.head = id;
        self.len += 1;
    }

    /// Unlinks `id`. `id` must be on this chain.
    pub(crate) fn remove<S: Linked>(&mut self, slots: &mut [S], id: SlotId) {
        let chain = self.chain;
        let Links { prev, next } = *slots[id.index()].links(chain);
        if prev.is_valid() {
            slots[prev.index()].links_mut(chain).next = next;
        } else {
            self.head = next;
        }
        if next.is_valid() {
            slots[next.index()].links_mut(chain).prev = prev;
        } else {
            self.tail = prev;
        }
        *slots[id.index()].links_mut(chain) = Links::UNLINKED;
        self.len -= 1;
    }

    /// Moves `id` to the head. `id` must be on this chain.
    pub(crate) fn move_to_front<S: Linked>(&mut self, slots: &mut [S], id: SlotId) {
        if self.head == id {
            return;
        }
        self.remove(slots, id);
        self.push_front(slots, id);
    }

    /// Walks the chain from head to tail.
    pub(crate) fn iter<'a, S: Linked>(&self, slots: &'a [S]) -> impl Iterator<Item = SlotId> + 'a {
        let chain = self.chain;
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if !cursor.is_valid() {
                return None;
            }
            let id = cursor;
            cursor = slots[id.index()].links(chain).next;
            Some(id)
        })
    }
}
