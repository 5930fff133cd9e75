//! Scoped bump allocation for statement and session lifetimes.

use bumpalo::Bump;
use heron_common::{HeronConfig, HeronError, Result};
use std::cell::Cell;
use tracing::{trace, warn};

/// Bump allocator whose allocations live exactly as long as the arena.
///
/// Nothing is freed individually. Blocks are requested from the system on
/// demand, starting with `block_size` bytes, and released together when the
/// arena is dropped or [`reset`](Self::reset). Every slice handed out is
/// zero-filled, so no content survives from one arena (or one reset) to the
/// next.
///
/// The arena is `Send` but not `Sync`: one execution context owns it.
pub struct MemoryArena {
    bump: Bump,
    block_size: usize,
    limit: Option<usize>,
    /// Bytes handed out since creation or the last reset.
    used: Cell<usize>,
    /// Number of successful allocations since creation or the last reset.
    allocations: Cell<usize>,
}

impl MemoryArena {
    /// Creates an arena with the given first block size and optional cap.
    pub fn new(block_size: usize, limit: Option<usize>) -> Self {
        Self {
            bump: Bump::with_capacity(block_size),
            block_size,
            limit,
            used: Cell::new(0),
            allocations: Cell::new(0),
        }
    }

    /// Creates an arena sized from the configuration.
    pub fn from_config(config: &HeronConfig) -> Self {
        Self::new(config.arena_block_size, config.arena_limit_bytes)
    }

    /// Returns the configured first block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the bytes handed out so far.
    pub fn used_bytes(&self) -> usize {
        self.used.get()
    }

    /// Returns the bytes reserved from the system, including unused block tails.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Returns the number of allocations served.
    pub fn allocation_count(&self) -> usize {
        self.allocations.get()
    }

    /// Accounts for `size` more bytes, failing once the cap would be exceeded.
    fn reserve(&self, size: usize) -> Result<()> {
        let next = self.used.get().saturating_add(size);
        if let Some(limit) = self.limit {
            if next > limit {
                warn!(requested = size, used = self.used.get(), limit, "arena limit reached");
                return Err(HeronError::ArenaExhausted {
                    requested: size,
                    limit,
                });
            }
        }
        self.used.set(next);
        self.allocations.set(self.allocations.get() + 1);
        Ok(())
    }

    /// Allocates `size` bytes.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc(&self, size: usize) -> Result<&mut [u8]> {
        self.reserve(size)?;
        Ok(self.bump.alloc_slice_fill_copy(size, 0u8))
    }

    /// Allocates `size` bytes, guaranteed zero-filled.
    #[allow(clippy::mut_from_ref)]
    pub fn calloc(&self, size: usize) -> Result<&mut [u8]> {
        self.alloc(size)
    }

    /// Copies `text` into the arena.
    pub fn strdup(&self, text: &str) -> Result<&str> {
        self.reserve(text.len())?;
        Ok(self.bump.alloc_str(text))
    }

    /// Copies `bytes` into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn memdup(&self, bytes: &[u8]) -> Result<&mut [u8]> {
        self.reserve(bytes.len())?;
        Ok(self.bump.alloc_slice_copy(bytes))
    }

    /// Releases every allocation at once, keeping the largest block for reuse.
    pub fn reset(&mut self) {
        trace!(used = self.used.get(), allocations = self.allocations.get(), "arena reset");
        self.bump.reset();
        self.used.set(0);
        self.allocations.set(0);
    }
}

impl std::fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArena")
            .field("block_size", &self.block_size)
            .field("limit", &self.limit)
            .field("used", &self.used.get())
            .field("allocations", &self.allocations.get())
            .finish()
    }
}
