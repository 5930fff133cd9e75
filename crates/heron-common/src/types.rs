//! Identifier types shared across Heron components.

use serde::{Deserialize, Serialize};

/// Physical location of a row inside a table's row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowPosition(pub u64);

impl RowPosition {
    /// Sentinel meaning "no current row".
    pub const NONE: RowPosition = RowPosition(u64::MAX);

    /// Returns true if this refers to an actual row.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::NONE
    }
}

impl std::fmt::Display for RowPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "row:{}", self.0)
        } else {
            f.write_str("row:none")
        }
    }
}

/// Index number within one table, `0..MAX_INDEXES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u16);

impl IndexId {
    /// Returns the index number as a bitmap position.
    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for IndexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx:{}", self.0)
    }
}

/// Stable identifier of one physical table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId {
    /// Schema (database) name.
    pub schema: String,
    /// Table name within the schema.
    pub name: String,
}

impl TableId {
    /// Creates a new table identifier.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
