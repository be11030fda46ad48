//! Coordination handle from a writer pool to linked readers.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use loadstone_core::Key;

/// A linked reader's view of a writer pool: the published watermark and
/// whether any writers are still running.
///
/// Cheap to clone; every clone observes the same pool.
#[derive(Debug, Clone)]
pub struct WriterLink {
    watermark: Arc<AtomicI64>,
    active: Arc<AtomicU64>,
    started: Arc<AtomicBool>,
}

impl WriterLink {
    pub(crate) const fn new(
        watermark: Arc<AtomicI64>,
        active: Arc<AtomicU64>,
        started: Arc<AtomicBool>,
    ) -> Self {
        Self {
            watermark,
            active,
            started,
        }
    }

    /// Returns the writer pool's published watermark. Before the pool
    /// starts this is [`Key::MIN`], which no window can satisfy.
    #[must_use]
    pub fn watermark(&self) -> Key {
        Key::new(self.watermark.load(Ordering::Acquire))
    }

    /// Returns true once the pool has started and every worker has
    /// finished.
    ///
    /// Workers are counted active before the started flag flips, so this
    /// cannot report done while a writer could still publish.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.started.load(Ordering::Acquire) && self.active.load(Ordering::Acquire) == 0
    }
}
