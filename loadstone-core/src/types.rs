//! Strongly-typed identifiers and the key space.
//!
//! Following `TigerStyle`: explicit types prevent bugs from mixing up IDs.
//! Keys are signed 64-bit to match the store's key encoding; everything
//! else is 64-bit unsigned.

use std::fmt;

/// Macro to generate strongly-typed ID wrappers.
///
/// Each ID type wraps a u64 and provides:
/// - Type safety (can't mix `WorkerId` with `ColumnIndex`)
/// - Debug/Display formatting
/// - Zero-cost abstraction (same as raw u64)
macro_rules! define_id {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new ID from a raw u64 value.
            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw u64 value.
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns the next ID in sequence.
            ///
            /// # Panics
            /// Panics if the ID would overflow.
            #[inline]
            #[must_use]
            pub const fn next(self) -> Self {
                assert!(self.0 < u64::MAX, "ID overflow");
                Self(self.0 + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.get()
            }
        }
    };
}

define_id!(WorkerId, "worker", "Unique identifier for a worker within a pool.");
define_id!(ColumnIndex, "col", "Index of a column within a record.");

// -----------------------------------------------------------------------------
// Key
// -----------------------------------------------------------------------------

/// A key in the store's sorted 64-bit key space.
///
/// Keys are signed to match the store's native key encoding. `Key::MIN` is
/// the distinguished "nothing yet" value: a writer that has not started
/// publishes it as its watermark.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Key(i64);

impl Key {
    /// The distinguished minimum key. No run may include it; it marks
    /// "no key completed yet".
    pub const MIN: Self = Self(i64::MIN);

    /// Creates a key from a raw i64 value.
    #[inline]
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw i64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns the next key in sequence.
    ///
    /// # Panics
    /// Panics if the key would overflow.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        assert!(self.0 < i64::MAX, "key overflow");
        Self(self.0 + 1)
    }

    /// Returns `self + delta`, or `None` on overflow.
    #[inline]
    #[must_use]
    pub fn checked_add(self, delta: u64) -> Option<Self> {
        let delta = i64::try_from(delta).ok()?;
        self.0.checked_add(delta).map(Self)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key-{}", self.0)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Key> for i64 {
    fn from(key: Key) -> Self {
        key.get()
    }
}

// -----------------------------------------------------------------------------
// KeyRange
// -----------------------------------------------------------------------------

/// A half-open key interval `[start, end)`.
///
/// Immutable once constructed; engines capture it at `start()` and never
/// mutate it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRange {
    start: Key,
    end: Key,
}

impl KeyRange {
    /// Creates a key range covering `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `start > end` or if `start` is the
    /// distinguished minimum key.
    pub fn new(start: Key, end: Key) -> crate::Result<Self> {
        if start > end {
            return Err(crate::Error::InvalidArgument {
                name: "start",
                reason: "must be <= end",
            });
        }
        if start == Key::MIN {
            return Err(crate::Error::InvalidArgument {
                name: "start",
                reason: "must be above the distinguished minimum key",
            });
        }
        Ok(Self { start, end })
    }

    /// Returns the inclusive start of the range.
    #[inline]
    #[must_use]
    pub const fn start(self) -> Key {
        self.start
    }

    /// Returns the exclusive end of the range.
    #[inline]
    #[must_use]
    pub const fn end(self) -> Key {
        self.end
    }

    /// Returns the number of keys in the range.
    #[must_use]
    pub const fn count(self) -> u64 {
        // start <= end, so the wrapping difference is the exact count.
        #[allow(clippy::cast_sign_loss)]
        let count = self.end.get().wrapping_sub(self.start.get()) as u64;
        count
    }

    /// Returns true if the range contains no keys.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.get() == self.end.get()
    }

    /// Returns true if `key` falls within `[start, end)`.
    #[must_use]
    pub const fn contains(self, key: Key) -> bool {
        key.get() >= self.start.get() && key.get() < self.end.get()
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.get(), self.end.get())
    }
}
