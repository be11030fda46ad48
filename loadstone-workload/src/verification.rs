//! Record verification against regenerated expectations.

use std::fmt;

use bytes::Bytes;
use loadstone_core::{ColumnIndex, Key, Record};

use crate::value::{ColumnValue, ValueError};

/// What a mismatched value turned out to be on closer inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDiagnosis {
    /// Parses cleanly and claims this cell; contents differ from the
    /// expected generation.
    Intact,
    /// Parses cleanly but claims a different cell.
    Foreign {
        /// Key named in the value's header.
        key: Key,
        /// Column named in the value's header.
        column_index: ColumnIndex,
    },
    /// Framing or checksum broken.
    Corrupted,
    /// Too short to carry a header; nothing to diagnose.
    Opaque,
}

impl fmt::Display for ValueDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intact => write!(f, "self-consistent"),
            Self::Foreign { key, column_index } => {
                write!(f, "belongs to {key} {column_index}")
            }
            Self::Corrupted => write!(f, "checksum or framing broken"),
            Self::Opaque => write!(f, "no verification header"),
        }
    }
}

/// A single discrepancy between the expected and fetched record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The store returned no record at all.
    MissingRecord {
        /// Key that should have been present.
        key: Key,
    },
    /// An expected column is absent.
    MissingColumn {
        /// Key of the record.
        key: Key,
        /// Column that should have been present.
        column_index: ColumnIndex,
    },
    /// The store holds a column the generator never produces.
    UnexpectedColumn {
        /// Key of the record.
        key: Key,
        /// Column that should not exist.
        column_index: ColumnIndex,
    },
    /// A column's bytes differ from the expected generation.
    ValueMismatch {
        /// Key of the record.
        key: Key,
        /// Column whose value differs.
        column_index: ColumnIndex,
        /// Expected value length in bytes.
        expected_len: usize,
        /// Fetched value length in bytes.
        actual_len: usize,
        /// What the fetched bytes look like.
        diagnosis: ValueDiagnosis,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRecord { key } => write!(f, "record missing at {key}"),
            Self::MissingColumn { key, column_index } => {
                write!(f, "missing {column_index} at {key}")
            }
            Self::UnexpectedColumn { key, column_index } => {
                write!(f, "unexpected {column_index} at {key}")
            }
            Self::ValueMismatch {
                key,
                column_index,
                expected_len,
                actual_len,
                diagnosis,
            } => write!(
                f,
                "value mismatch at {key} {column_index} \
                 (expected {expected_len} bytes, got {actual_len}: {diagnosis})"
            ),
        }
    }
}

/// Compares a fetched record against the expected generation.
///
/// Returns every discrepancy found, in column order, so callers can log
/// each one. An empty vec means the record verified clean.
#[must_use]
pub fn compare_record(expected: &Record, actual: Option<&Record>) -> Vec<Mismatch> {
    let key = expected.key();
    let Some(actual) = actual else {
        return vec![Mismatch::MissingRecord { key }];
    };

    let mut mismatches = Vec::new();
    for (column_index, expected_value) in expected.columns() {
        match actual.get(column_index) {
            None => mismatches.push(Mismatch::MissingColumn { key, column_index }),
            Some(actual_value) if actual_value != expected_value => {
                mismatches.push(Mismatch::ValueMismatch {
                    key,
                    column_index,
                    expected_len: expected_value.len(),
                    actual_len: actual_value.len(),
                    diagnosis: diagnose_value(key, column_index, actual_value),
                });
            }
            Some(_) => {}
        }
    }
    for (column_index, _) in actual.columns() {
        if expected.get(column_index).is_none() {
            mismatches.push(Mismatch::UnexpectedColumn { key, column_index });
        }
    }
    mismatches
}

fn diagnose_value(key: Key, column_index: ColumnIndex, actual: &Bytes) -> ValueDiagnosis {
    match ColumnValue::parse(actual) {
        Err(ValueError::TooShort(_)) => ValueDiagnosis::Opaque,
        Err(_) => ValueDiagnosis::Corrupted,
        Ok(value) if value.key() == key && value.column_index() == column_index => {
            ValueDiagnosis::Intact
        }
        Ok(value) => ValueDiagnosis::Foreign {
            key: value.key(),
            column_index: value.column_index(),
        },
    }
}
