//! Deterministic record generation.
//!
//! Every record is a pure function of its key: the column count, each
//! value's size, and each value's bytes are all drawn from RNGs seeded
//! off the key. Writers and readers hold identical generators, so a
//! reader can reconstruct the exact record any writer produced without
//! any shared state.

use bytes::Bytes;
use loadstone_core::{ColumnIndex, Key, Record};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::value::{ColumnValue, VALUE_HEADER_SIZE};

// 64-bit golden ratio; spreads consecutive keys across the seed space.
pub(crate) const GOLDEN_MULTIPLIER: u64 = 0x9e37_79b9_7f4a_7c15;

// Different multiplier so column draws are independent of row draws.
const COLUMN_MULTIPLIER: u64 = 0xc6a4_a793_5bd1_e995;

fn row_seed(key: Key) -> u64 {
    #[allow(clippy::cast_sign_loss)]
    let key = key.get() as u64;
    key.wrapping_mul(GOLDEN_MULTIPLIER)
}

fn column_seed(key: Key, index: ColumnIndex) -> u64 {
    #[allow(clippy::cast_sign_loss)]
    let key = key.get() as u64;
    key.wrapping_add(index.get()).wrapping_mul(COLUMN_MULTIPLIER)
}

/// An inclusive `[min, max]` range for a sampled quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    min: u32,
    max: u32,
}

impl Bounds {
    /// Creates bounds covering `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `min > max`.
    pub fn new(min: u32, max: u32) -> loadstone_core::Result<Self> {
        if min > max {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "bounds",
                reason: "min must be <= max",
            });
        }
        Ok(Self { min, max })
    }

    /// Column-count bounds centered on `average`: `[1, 2 * average]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `average` is zero or `2 * average`
    /// overflows.
    pub fn from_average_columns(average: u32) -> loadstone_core::Result<Self> {
        if average == 0 {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "avg_columns",
                reason: "must be > 0",
            });
        }
        let max = average
            .checked_mul(2)
            .ok_or(loadstone_core::Error::InvalidArgument {
                name: "avg_columns",
                reason: "too large",
            })?;
        Self::new(1, max)
    }

    /// Value-size bounds centered on `average`: `[average / 2, average * 3 / 2]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `average` is zero or the upper bound
    /// overflows.
    pub fn from_average_size(average: u32) -> loadstone_core::Result<Self> {
        if average == 0 {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "avg_value_size",
                reason: "must be > 0",
            });
        }
        let max = average
            .checked_mul(3)
            .ok_or(loadstone_core::Error::InvalidArgument {
                name: "avg_value_size",
                reason: "too large",
            })?
            / 2;
        Self::new(average / 2, max)
    }

    /// Returns the inclusive lower bound.
    #[must_use]
    pub const fn min(self) -> u32 {
        self.min
    }

    /// Returns the inclusive upper bound.
    #[must_use]
    pub const fn max(self) -> u32 {
        self.max
    }

    /// Draws a value uniformly from `[min, max]`.
    pub fn sample<R: Rng>(self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.max)
    }
}

/// Deterministic generator shared by writers and readers.
#[derive(Debug, Clone, Copy)]
pub struct RecordGenerator {
    columns: Bounds,
    value_sizes: Bounds,
}

impl RecordGenerator {
    /// Creates a generator drawing column counts from `columns` and
    /// value sizes from `value_sizes`.
    #[must_use]
    pub const fn new(columns: Bounds, value_sizes: Bounds) -> Self {
        Self {
            columns,
            value_sizes,
        }
    }

    /// Generates the record for `key`. Same key, same record, always.
    #[must_use]
    pub fn generate(&self, key: Key) -> Record {
        let mut row_rng = ChaCha8Rng::seed_from_u64(row_seed(key));
        let column_count = self.columns.sample(&mut row_rng);

        let mut record = Record::new(key);
        for index in 0..u64::from(column_count) {
            let index = ColumnIndex::new(index);
            record.insert(index, self.column_bytes(key, index));
        }
        record
    }

    /// Generates the bytes for one cell.
    ///
    /// Values with room for the header are self-describing
    /// [`ColumnValue`]s; smaller draws fall back to raw deterministic
    /// fill, which readers can still compare byte-for-byte.
    fn column_bytes(&self, key: Key, index: ColumnIndex) -> Bytes {
        let mut rng = ChaCha8Rng::seed_from_u64(column_seed(key, index));
        let size = self.value_sizes.sample(&mut rng) as usize;

        if size >= VALUE_HEADER_SIZE {
            ColumnValue::new(key, index, size - VALUE_HEADER_SIZE, &mut rng).encode()
        } else {
            let mut fill = vec![0u8; size];
            rng.fill_bytes(&mut fill);
            Bytes::from(fill)
        }
    }
}
