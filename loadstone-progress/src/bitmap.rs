//! Bitmap helpers for completion tracking.
//!
//! `WriteProgress` stores pending completions in a [`RoaringBitmap`]
//! keyed by offset from the contiguous boundary. These helpers keep the
//! key-to-offset arithmetic in one place.

use loadstone_core::Key;
use roaring::RoaringBitmap;

/// Extension trait mapping keys onto bitmap offsets relative to a base key.
///
/// Offsets are bounded by `Limits::max_pending_completions`, which is
/// validated to fit in a u32, so the truncating casts below are safe.
pub trait KeyBitmap {
    /// Marks `key` complete, relative to `base`.
    fn set_key(&mut self, base: Key, key: Key);

    /// Returns true if `key` is marked complete, relative to `base`.
    fn has_key(&self, base: Key, key: Key) -> bool;

    /// Clears the completion bit for `key`, relative to `base`.
    fn clear_key(&mut self, base: Key, key: Key);

    /// Counts the contiguous run of set bits starting at offset zero.
    fn contiguous_count(&self) -> u64;

    /// Shifts all bits down by `count`, dropping bits below `count`.
    fn shift_down(&mut self, count: u64);
}

impl KeyBitmap for RoaringBitmap {
    fn set_key(&mut self, base: Key, key: Key) {
        // Assert preconditions.
        assert!(key >= base, "key below bitmap base");

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = key.get().wrapping_sub(base.get()) as u32;
        self.insert(offset);
    }

    fn has_key(&self, base: Key, key: Key) -> bool {
        if key < base {
            return false;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = key.get().wrapping_sub(base.get()) as u32;
        self.contains(offset)
    }

    fn clear_key(&mut self, base: Key, key: Key) {
        // Assert preconditions.
        assert!(key >= base, "key below bitmap base");

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = key.get().wrapping_sub(base.get()) as u32;
        self.remove(offset);
    }

    fn contiguous_count(&self) -> u64 {
        // Bound the loop.
        const MAX_CHECK: u64 = 10_000_000;

        let mut count: u64 = 0;
        while count < MAX_CHECK {
            #[allow(clippy::cast_possible_truncation)]
            let offset = count as u32;
            if !self.contains(offset) {
                break;
            }
            count += 1;
        }
        count
    }

    fn shift_down(&mut self, count: u64) {
        if count == 0 {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        let count = count as u32;
        let shifted: RoaringBitmap = self
            .iter()
            .filter(|&offset| offset >= count)
            .map(|offset| offset - count)
            .collect();
        *self = shifted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_has_relative_to_base() {
        let mut bitmap = RoaringBitmap::new();
        let base = Key::new(100);

        bitmap.set_key(base, Key::new(100));
        bitmap.set_key(base, Key::new(105));

        assert!(bitmap.has_key(base, Key::new(100)));
        assert!(bitmap.has_key(base, Key::new(105)));
        assert!(!bitmap.has_key(base, Key::new(101)));
        assert!(!bitmap.has_key(base, Key::new(99)));
    }

    #[test]
    fn test_negative_base() {
        let mut bitmap = RoaringBitmap::new();
        let base = Key::new(-50);

        bitmap.set_key(base, Key::new(-50));
        bitmap.set_key(base, Key::new(-1));

        assert!(bitmap.has_key(base, Key::new(-50)));
        assert!(bitmap.has_key(base, Key::new(-1)));
        assert!(!bitmap.has_key(base, Key::new(0)));
    }

    #[test]
    fn test_clear_key() {
        let mut bitmap = RoaringBitmap::new();
        let base = Key::new(0);

        bitmap.set_key(base, Key::new(3));
        assert!(bitmap.has_key(base, Key::new(3)));

        bitmap.clear_key(base, Key::new(3));
        assert!(!bitmap.has_key(base, Key::new(3)));
    }

    #[test]
    #[should_panic(expected = "key below bitmap base")]
    fn test_set_below_base_panics() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.set_key(Key::new(10), Key::new(9));
    }

    #[test]
    fn test_contiguous_count_empty() {
        let bitmap = RoaringBitmap::new();
        assert_eq!(bitmap.contiguous_count(), 0);
    }

    #[test]
    fn test_contiguous_count_with_gap() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(0);
        bitmap.insert(1);
        bitmap.insert(2);
        bitmap.insert(4);

        assert_eq!(bitmap.contiguous_count(), 3);
    }

    #[test]
    fn test_contiguous_count_not_starting_at_zero() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(1);
        bitmap.insert(2);

        assert_eq!(bitmap.contiguous_count(), 0);
    }

    #[test]
    fn test_shift_down() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(0);
        bitmap.insert(1);
        bitmap.insert(4);
        bitmap.insert(7);

        bitmap.shift_down(2);

        assert!(!bitmap.contains(0));
        assert!(!bitmap.contains(1));
        assert!(bitmap.contains(2));
        assert!(bitmap.contains(5));
        assert_eq!(bitmap.len(), 2);
    }

    #[test]
    fn test_shift_down_zero_is_noop() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(3);
        bitmap.shift_down(0);
        assert!(bitmap.contains(3));
    }
}
