//! Records: a key plus its column values.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::{ColumnIndex, Key, Limits};

/// A record is a key together with its columns, ordered by column index.
///
/// Column values are `Bytes` so records can be cloned and passed between
/// tasks without copying the payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Key,
    columns: BTreeMap<ColumnIndex, Bytes>,
}

impl Record {
    /// Creates an empty record for `key`.
    #[must_use]
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            columns: BTreeMap::new(),
        }
    }

    /// Creates a record from a pre-built column map.
    #[must_use]
    pub const fn with_columns(key: Key, columns: BTreeMap<ColumnIndex, Bytes>) -> Self {
        Self { key, columns }
    }

    /// Returns the record's key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> Key {
        self.key
    }

    /// Inserts a column value, replacing any previous value at that index.
    pub fn insert(&mut self, index: ColumnIndex, value: Bytes) {
        self.columns.insert(index, value);
    }

    /// Returns the value at `index`, if present.
    #[must_use]
    pub fn get(&self, index: ColumnIndex) -> Option<&Bytes> {
        self.columns.get(&index)
    }

    /// Iterates over columns in index order.
    pub fn columns(&self) -> impl Iterator<Item = (ColumnIndex, &Bytes)> {
        self.columns.iter().map(|(index, value)| (*index, value))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the total size of all column values in bytes.
    #[must_use]
    pub fn value_bytes(&self) -> u64 {
        self.columns.values().map(|value| value.len() as u64).sum()
    }

    /// Validates the record against the configured limits.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` if the record has too many columns or any
    /// single value is too large.
    pub fn validate(&self, limits: &Limits) -> crate::Result<()> {
        if self.columns.len() > limits.max_columns_per_key as usize {
            return Err(crate::Error::LimitExceeded {
                limit: "max_columns_per_key",
                max: u64::from(limits.max_columns_per_key),
                actual: self.columns.len() as u64,
            });
        }
        for value in self.columns.values() {
            if value.len() > limits.max_value_bytes as usize {
                return Err(crate::Error::LimitExceeded {
                    limit: "max_value_bytes",
                    max: u64::from(limits.max_value_bytes),
                    actual: value.len() as u64,
                });
            }
        }
        Ok(())
    }
}
