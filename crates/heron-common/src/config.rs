//! Configuration for the table-handle layer.

use crate::bitmap::MAX_INDEXES;
use crate::error::{HeronError, Result};
use serde::{Deserialize, Serialize};

/// Tunables exposed to the session and DDL layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeronConfig {
    /// Maximum number of idle handles kept for reuse.
    pub max_idle_handles: usize,
    /// Number of usable index slots per table (at most `MAX_INDEXES`).
    pub max_indexes: usize,
    /// Size in bytes of the first block of every memory arena.
    pub arena_block_size: usize,
    /// Hard cap on bytes handed out by one arena (None = unbounded).
    pub arena_limit_bytes: Option<usize>,
}

impl Default for HeronConfig {
    fn default() -> Self {
        Self {
            max_idle_handles: 400,
            max_indexes: MAX_INDEXES,
            arena_block_size: 8 * 1024, // 8 KB
            arena_limit_bytes: None,
        }
    }
}

impl HeronConfig {
    /// Parses a JSON document and validates the result.
    ///
    /// Missing fields take their default value.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: HeronConfig =
            serde_json::from_str(text).map_err(|e| HeronError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every field is within its supported range.
    pub fn validate(&self) -> Result<()> {
        if self.max_indexes == 0 || self.max_indexes > MAX_INDEXES {
            return Err(HeronError::InvalidParameter {
                name: "max_indexes".to_string(),
                value: self.max_indexes.to_string(),
            });
        }
        if self.arena_block_size == 0 {
            return Err(HeronError::InvalidParameter {
                name: "arena_block_size".to_string(),
                value: "0".to_string(),
            });
        }
        if let Some(limit) = self.arena_limit_bytes {
            if limit < self.arena_block_size {
                return Err(HeronError::ConfigError(format!(
                    "arena_limit_bytes ({limit}) is smaller than arena_block_size ({})",
                    self.arena_block_size
                )));
            }
        }
        Ok(())
    }
}
