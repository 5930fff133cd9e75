//! Heron common types, errors, and utilities.
//!
//! This crate provides shared definitions used across all Heron components.

pub mod bitmap;
pub mod config;
pub mod error;
pub mod types;

pub use bitmap::{IndexBitmap, MAX_INDEXES};
pub use config::HeronConfig;
pub use error::{ErrorKind, HeronError, Result};
pub use types::{IndexId, RowPosition, TableId};
