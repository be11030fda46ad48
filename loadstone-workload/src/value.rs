//! Self-describing column values.
//!
//! Every generated value large enough to carry it starts with a fixed
//! header naming the cell it belongs to plus a checksum over the whole
//! payload. A reader can then tell apart a corrupted value, a value
//! written to the wrong cell, and a value from outside the run without
//! regenerating anything.

use bytes::{BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_64_ECMA_182};
use loadstone_core::{ColumnIndex, Key};
use rand::RngCore;

/// Size of the value header in bytes: key, column index, checksum, and
/// fill length, each 8 bytes big-endian.
pub const VALUE_HEADER_SIZE: usize = 32;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Errors from parsing a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The buffer is smaller than the header.
    #[error("value too short for header: {0} bytes")]
    TooShort(usize),

    /// The header's fill length disagrees with the buffer.
    #[error("fill length mismatch: header says {expected}, buffer has {actual}")]
    LengthMismatch {
        /// Fill length claimed by the header.
        expected: u64,
        /// Fill bytes actually present.
        actual: u64,
    },

    /// The checksum does not cover the payload.
    #[error("checksum mismatch: stored {expected:#018x}, computed {computed:#018x}")]
    ChecksumMismatch {
        /// Checksum stored in the header.
        expected: u64,
        /// Checksum computed over the payload.
        computed: u64,
    },
}

/// A parsed or freshly generated column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValue {
    key: Key,
    column_index: ColumnIndex,
    checksum: u64,
    fill: Bytes,
}

impl ColumnValue {
    /// Generates a value for `(key, column_index)` with `fill_size`
    /// random bytes drawn from `rng`.
    pub fn new<R: RngCore>(
        key: Key,
        column_index: ColumnIndex,
        fill_size: usize,
        rng: &mut R,
    ) -> Self {
        let mut fill = vec![0u8; fill_size];
        rng.fill_bytes(&mut fill);
        let fill = Bytes::from(fill);
        let checksum = Self::compute_checksum(key, column_index, &fill);
        Self {
            key,
            column_index,
            checksum,
            fill,
        }
    }

    /// Returns the key this value was generated for.
    #[must_use]
    pub const fn key(&self) -> Key {
        self.key
    }

    /// Returns the column this value was generated for.
    #[must_use]
    pub const fn column_index(&self) -> ColumnIndex {
        self.column_index
    }

    /// Returns the stored checksum.
    #[must_use]
    pub const fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Returns the fill bytes.
    #[must_use]
    pub const fn fill(&self) -> &Bytes {
        &self.fill
    }

    /// Returns the encoded size for a given fill size.
    #[must_use]
    pub const fn encoded_size(fill_size: usize) -> usize {
        VALUE_HEADER_SIZE + fill_size
    }

    /// Encodes the value as header plus fill.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::encoded_size(self.fill.len()));
        buf.put_i64(self.key.get());
        buf.put_u64(self.column_index.get());
        buf.put_u64(self.checksum);
        buf.put_u64(self.fill.len() as u64);
        buf.put_slice(&self.fill);
        buf.freeze()
    }

    /// Parses and fully validates an encoded value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] if the buffer is too short, the framed
    /// length disagrees with the buffer, or the checksum does not match.
    pub fn parse(buf: &[u8]) -> Result<Self, ValueError> {
        if buf.len() < VALUE_HEADER_SIZE {
            return Err(ValueError::TooShort(buf.len()));
        }

        // Header fields are fixed-width big-endian; the slice bounds
        // are guaranteed by the length check above.
        let key = Key::new(i64::from_be_bytes(buf[0..8].try_into().expect("8 bytes")));
        let column_index =
            ColumnIndex::new(u64::from_be_bytes(buf[8..16].try_into().expect("8 bytes")));
        let checksum = u64::from_be_bytes(buf[16..24].try_into().expect("8 bytes"));
        let fill_len = u64::from_be_bytes(buf[24..32].try_into().expect("8 bytes"));

        let actual = (buf.len() - VALUE_HEADER_SIZE) as u64;
        if fill_len != actual {
            return Err(ValueError::LengthMismatch {
                expected: fill_len,
                actual,
            });
        }

        let fill = Bytes::copy_from_slice(&buf[VALUE_HEADER_SIZE..]);
        let computed = Self::compute_checksum(key, column_index, &fill);
        if computed != checksum {
            return Err(ValueError::ChecksumMismatch {
                expected: checksum,
                computed,
            });
        }

        Ok(Self {
            key,
            column_index,
            checksum,
            fill,
        })
    }

    /// Returns true if the stored checksum covers the payload.
    #[must_use]
    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.key, self.column_index, &self.fill)
    }

    fn compute_checksum(key: Key, column_index: ColumnIndex, fill: &[u8]) -> u64 {
        let mut digest = CRC64.digest();
        digest.update(&key.get().to_be_bytes());
        digest.update(&column_index.get().to_be_bytes());
        digest.update(fill);
        digest.finalize()
    }
}
