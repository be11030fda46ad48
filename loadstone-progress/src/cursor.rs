//! Lock-free key cursor shared by a worker pool.

use std::sync::atomic::{AtomicI64, Ordering};

use loadstone_core::{Key, KeyRange};

/// Hands out each key in a range exactly once across any number of workers.
///
/// The cursor is a single atomic over the half-open range `[start, end)`.
/// Claims go through compare-exchange, so a worker can inspect the next
/// key with [`peek`](Self::peek) and only take it with
/// [`try_claim`](Self::try_claim) once its own preconditions hold; the
/// inspected key cannot be skipped or handed out twice in between.
#[derive(Debug)]
pub struct KeyCursor {
    range: KeyRange,
    next: AtomicI64,
}

impl KeyCursor {
    /// Creates a cursor positioned at the start of `range`.
    #[must_use]
    pub fn new(range: KeyRange) -> Self {
        Self {
            range,
            next: AtomicI64::new(range.start().get()),
        }
    }

    /// Returns the next unclaimed key without claiming it, or `None` if
    /// the range is exhausted.
    #[must_use]
    pub fn peek(&self) -> Option<Key> {
        let next = self.next.load(Ordering::Acquire);
        if next >= self.range.end().get() {
            return None;
        }
        Some(Key::new(next))
    }

    /// Claims `key` if it is still the next unclaimed key.
    ///
    /// Returns false if another worker claimed it first. The caller must
    /// have obtained `key` from [`peek`](Self::peek); the cursor never
    /// moves past `end`, so a successful claim is always in range.
    #[must_use]
    pub fn try_claim(&self, key: Key) -> bool {
        debug_assert!(self.range.contains(key), "claim outside range");

        self.next
            .compare_exchange(
                key.get(),
                key.get() + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Claims and returns the next key, or `None` if the range is exhausted.
    #[must_use]
    pub fn next_key(&self) -> Option<Key> {
        loop {
            let key = self.peek()?;
            if self.try_claim(key) {
                return Some(key);
            }
        }
    }

    /// Returns the number of keys claimed so far.
    #[must_use]
    pub fn claimed(&self) -> u64 {
        let next = self.next.load(Ordering::Acquire);
        #[allow(clippy::cast_sign_loss)]
        let claimed = next.wrapping_sub(self.range.start().get()) as u64;
        claimed
    }

    /// Returns true if every key in the range has been claimed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next.load(Ordering::Acquire) >= self.range.end().get()
    }

    /// Returns the range this cursor covers.
    #[must_use]
    pub const fn range(&self) -> KeyRange {
        self.range
    }
}
