//! Contiguous-prefix completion tracking.

use loadstone_core::Key;
use roaring::RoaringBitmap;

use crate::bitmap::KeyBitmap;

/// Tracks which keys a writer pool has completed and exposes the highest
/// key with every key at or below it complete.
///
/// Completions may arrive in any order. The tracker keeps a moving
/// boundary `next_expected` plus a bitmap of completions at or above it;
/// when the boundary key completes, the boundary advances over the whole
/// contiguous run in one drain.
///
/// Callers serialize access externally (the writer pool holds it behind
/// a mutex) and publish `watermark()` through an atomic for readers.
#[derive(Debug)]
pub struct WriteProgress {
    start: Key,
    next_expected: i64,
    completed: RoaringBitmap,
    max_pending: u64,
}

impl WriteProgress {
    /// Creates a tracker for completions starting at `start`.
    ///
    /// # Panics
    /// Panics if `start` is the distinguished minimum key or if
    /// `max_pending` is zero.
    #[must_use]
    pub fn new(start: Key, max_pending: u64) -> Self {
        // Assert preconditions. watermark() is start - 1 before any
        // completion, so start must leave room below it.
        assert!(start.get() > i64::MIN, "start must be above Key::MIN");
        assert!(max_pending > 0, "max_pending must be > 0");

        Self {
            start,
            next_expected: start.get(),
            completed: RoaringBitmap::new(),
            max_pending,
        }
    }

    /// Records that `key` has completed, advancing the watermark over any
    /// contiguous run this completion closes.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` if the completion needs a window of more
    /// than `max_pending` keys from the boundary, which happens once a
    /// key below it never completes and the boundary stays pinned. The
    /// tracker is unchanged and the key stays uncounted.
    ///
    /// # Panics
    /// Panics if `key` was already counted (at or below the boundary, or
    /// pending).
    pub fn record_completion(&mut self, key: Key) -> loadstone_core::Result<()> {
        // Assert preconditions.
        assert!(
            key.get() >= self.next_expected,
            "completion at or below watermark boundary"
        );
        let base = Key::new(self.next_expected);
        #[allow(clippy::cast_sign_loss)]
        let span = key.get().wrapping_sub(self.next_expected) as u64;
        if span >= self.max_pending {
            return Err(loadstone_core::Error::LimitExceeded {
                limit: "max_pending_completions",
                max: self.max_pending,
                actual: span + 1,
            });
        }
        assert!(!self.completed.has_key(base, key), "duplicate completion");

        self.completed.set_key(base, key);

        // Drain the contiguous run if this completion closed the boundary.
        if key.get() == self.next_expected {
            let run = self.completed.contiguous_count();
            self.completed.shift_down(run);
            #[allow(clippy::cast_possible_wrap)]
            {
                self.next_expected += run as i64;
            }
        }
        Ok(())
    }

    /// Returns the highest key with every key at or below it complete,
    /// or `start - 1` if no contiguous prefix exists yet.
    #[must_use]
    pub const fn watermark(&self) -> Key {
        Key::new(self.next_expected - 1)
    }

    /// Returns the start key this tracker was created with.
    #[must_use]
    pub const fn start(&self) -> Key {
        self.start
    }

    /// Returns the number of completions waiting above the boundary.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.completed.len()
    }
}
