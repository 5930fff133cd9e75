//! Per-statement execution context.

use crate::arena::MemoryArena;
use heron_common::{HeronConfig, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Execution context owning the current memory arena.
///
/// The arena is reached through the context that is passed to the code doing
/// the work, so concurrent contexts never observe each other's arena.
pub struct ExecutionContext {
    id: u64,
    arena: MemoryArena,
}

impl ExecutionContext {
    /// Creates a context with a fresh arena.
    pub fn new(config: &HeronConfig) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(context = id, block_size = config.arena_block_size, "context opened");
        Self {
            id,
            arena: MemoryArena::from_config(config),
        }
    }

    /// Runs `f` inside a new context.
    ///
    /// The arena is released when `f` returns, whether it succeeded, failed,
    /// or unwound.
    pub fn run<T, F>(config: &HeronConfig, f: F) -> Result<T>
    where
        F: FnOnce(&ExecutionContext) -> Result<T>,
    {
        let ctx = Self::new(config);
        f(&ctx)
    }

    /// Returns the context id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the arena current for this context.
    pub fn arena(&self) -> &MemoryArena {
        &self.arena
    }

    /// Releases everything allocated so far so the context can be reused.
    pub fn reset(&mut self) {
        self.arena.reset();
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        trace!(
            context = self.id,
            used = self.arena.used_bytes(),
            allocations = self.arena.allocation_count(),
            "context closed"
        );
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("arena", &self.arena)
            .finish()
    }
}
