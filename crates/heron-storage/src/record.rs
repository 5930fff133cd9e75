//! Row records exchanged between handles and callers.

use bytes::Bytes;

/// A row as an ordered list of column values.
///
/// Callers hand a `Record` to the read paths as the record buffer: on
/// success it is overwritten with the row just read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    columns: Vec<Bytes>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Creates a record from column values.
    pub fn from_columns<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bytes>,
    {
        Self {
            columns: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns column `i`, if present.
    #[inline]
    pub fn column(&self, i: usize) -> Option<&Bytes> {
        self.columns.get(i)
    }

    /// Returns all columns.
    pub fn columns(&self) -> &[Bytes] {
        &self.columns
    }

    /// Replaces column `i`, extending the record with empty columns if needed.
    pub fn set_column(&mut self, i: usize, value: impl Into<Bytes>) {
        if i >= self.columns.len() {
            self.columns.resize(i + 1, Bytes::new());
        }
        self.columns[i] = value.into();
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Overwrites this record with `other`.
    pub fn copy_from(&mut self, other: &Record) {
        self.columns.clone_from(&other.columns);
    }

    /// Total payload size in bytes.
    pub fn size(&self) -> usize {
        self.columns.iter().map(Bytes::len).sum()
    }
}
