//! Error types for Heron.

use thiserror::Error;

/// Result type alias using HeronError.
pub type Result<T> = std::result::Result<T, HeronError>;

/// Coarse error categories callers branch on.
///
/// Every `HeronError` maps onto one of these through [`HeronError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested index is not currently active.
    WrongIndex,
    /// No current row, or the row was deleted.
    KeyNotFound,
    /// No further rows.
    EndOfFile,
    /// Underlying read or positioning failed.
    IoFailure,
    /// Anything else (configuration, catalog, internal).
    Other,
}

/// Errors that can occur in Heron operations.
#[derive(Debug, Error)]
pub enum HeronError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    // Index and row errors
    #[error("Wrong index: {index} is not active")]
    WrongIndex { index: u16 },

    #[error("Index {index} out of range (max {max})")]
    IndexOutOfRange { index: usize, max: usize },

    #[error("Key not found")]
    KeyNotFound,

    #[error("End of file")]
    EndOfFile,

    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Column not found: {0}")]
    ColumnNotFound(usize),

    // Arena errors
    #[error("Arena exhausted: requested {requested} bytes (limit {limit})")]
    ArenaExhausted { requested: usize, limit: usize },

    // Catalog errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HeronError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeronError::WrongIndex { .. } => ErrorKind::WrongIndex,
            HeronError::KeyNotFound => ErrorKind::KeyNotFound,
            HeronError::EndOfFile => ErrorKind::EndOfFile,
            HeronError::Io(_) | HeronError::IoFailure(_) => ErrorKind::IoFailure,
            _ => ErrorKind::Other,
        }
    }
}
