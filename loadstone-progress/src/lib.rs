//! Loadstone Progress - Key partitioning and completion tracking.
//!
//! This crate owns the two pieces of shared state that coordinate a
//! worker pool over a key range:
//!
//! - [`KeyCursor`]: a lock-free cursor that hands out each key in a
//!   range exactly once across any number of workers.
//! - [`WriteProgress`]: tracks out-of-order completions and exposes the
//!   highest key with every key at or below it complete.
//!
//! # Example
//!
//! ```
//! use loadstone_core::{Key, KeyRange};
//! use loadstone_progress::{KeyCursor, WriteProgress};
//!
//! let range = KeyRange::new(Key::new(0), Key::new(3)).unwrap();
//! let cursor = KeyCursor::new(range);
//! let mut progress = WriteProgress::new(range.start(), 1024);
//!
//! // Workers claim keys; completions may arrive out of order.
//! let first = cursor.next_key().unwrap();
//! let second = cursor.next_key().unwrap();
//! progress.record_completion(second).unwrap();
//! assert_eq!(progress.watermark(), Key::new(-1));
//! progress.record_completion(first).unwrap();
//! assert_eq!(progress.watermark(), Key::new(1));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod bitmap;
mod cursor;
mod watermark;

pub use bitmap::KeyBitmap;
pub use cursor::KeyCursor;
pub use watermark::WriteProgress;
