//! Concurrent writer pool.
//!
//! A pool of workers claims keys from a shared cursor, generates each
//! key's record deterministically, and writes it. Completions feed a
//! contiguous-prefix tracker whose watermark is published atomically
//! for linked readers.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use loadstone_core::{Key, KeyRange, Limits, Record, WorkerId};
use loadstone_progress::{KeyCursor, WriteProgress};
use loadstone_store::{StoreClient, StoreResult};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::generator::{Bounds, RecordGenerator};
use crate::link::WriterLink;
use crate::{EngineError, EngineResult};

/// Configuration for a writer pool.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Table to write into.
    pub table: String,
    /// Write whole records in one call instead of column-by-column.
    pub multi_put: bool,
    /// Bounds on columns per key.
    pub columns: Bounds,
    /// Bounds on value sizes in bytes.
    pub value_sizes: Bounds,
}

impl WriterConfig {
    /// Validates the configuration against `limits`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` or `LimitExceeded` on bad settings.
    pub fn validate(&self, limits: &Limits) -> loadstone_core::Result<()> {
        if self.table.is_empty() {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "table",
                reason: "must not be empty",
            });
        }
        // A zero-column draw would produce an empty record, which no
        // store call accepts.
        if self.columns.min() == 0 {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "columns",
                reason: "minimum must be > 0",
            });
        }
        if self.columns.max() > limits.max_columns_per_key {
            return Err(loadstone_core::Error::LimitExceeded {
                limit: "max_columns_per_key",
                max: u64::from(limits.max_columns_per_key),
                actual: u64::from(self.columns.max()),
            });
        }
        if self.value_sizes.max() > limits.max_value_bytes {
            return Err(loadstone_core::Error::LimitExceeded {
                limit: "max_value_bytes",
                max: u64::from(limits.max_value_bytes),
                actual: u64::from(self.value_sizes.max()),
            });
        }
        Ok(())
    }
}

/// Final counters for a completed writer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSummary {
    /// Keys written and counted toward the watermark.
    pub keys_written: u64,
    /// Keys whose write failed or whose completion was rejected.
    pub keys_failed: u64,
    /// Highest key with every key at or below it written.
    pub watermark: Key,
}

impl WriterSummary {
    /// Prints the summary to stdout.
    pub fn print(&self) {
        println!("=== Writer Summary ===");
        println!("Keys written:  {}", self.keys_written);
        println!("Keys failed:   {}", self.keys_failed);
        println!("Watermark:     {}", self.watermark);
    }
}

// State shared between the engine handle and its workers.
struct WriterShared<S> {
    store: Arc<S>,
    table: String,
    multi_put: bool,
    limits: Limits,
    generator: RecordGenerator,
    cursor: KeyCursor,
    progress: Mutex<WriteProgress>,
    watermark: Arc<AtomicI64>,
    keys_written: Arc<AtomicU64>,
    keys_failed: Arc<AtomicU64>,
}

// Decrements the pool's active count when a worker exits, panic included.
struct ActiveGuard {
    active: Arc<AtomicU64>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A pool of writer workers over a key range.
pub struct WriterEngine<S: StoreClient + 'static> {
    store: Arc<S>,
    config: WriterConfig,
    limits: Limits,
    generator: RecordGenerator,
    watermark: Arc<AtomicI64>,
    keys_written: Arc<AtomicU64>,
    keys_failed: Arc<AtomicU64>,
    active: Arc<AtomicU64>,
    started: Arc<AtomicBool>,
    join_set: JoinSet<()>,
    launched: bool,
}

impl<S: StoreClient + 'static> WriterEngine<S> {
    /// Creates a writer pool. Workers are not spawned until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` or `limits` is invalid.
    pub fn new(store: Arc<S>, config: WriterConfig, limits: Limits) -> EngineResult<Self> {
        limits.validate()?;
        config.validate(&limits)?;

        let generator = RecordGenerator::new(config.columns, config.value_sizes);
        Ok(Self {
            store,
            config,
            limits,
            generator,
            watermark: Arc::new(AtomicI64::new(Key::MIN.get())),
            keys_written: Arc::new(AtomicU64::new(0)),
            keys_failed: Arc::new(AtomicU64::new(0)),
            active: Arc::new(AtomicU64::new(0)),
            started: Arc::new(AtomicBool::new(false)),
            join_set: JoinSet::new(),
            launched: false,
        })
    }

    /// Spawns `workers` workers over `range`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pool already started, if
    /// `workers` is zero, or if it exceeds the worker limit.
    pub fn start(&mut self, range: KeyRange, workers: u32) -> EngineResult<()> {
        if self.launched {
            return Err(loadstone_core::Error::InvalidState {
                current: "started",
                required: "idle",
            }
            .into());
        }
        if workers == 0 {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "workers",
                reason: "must be > 0",
            }
            .into());
        }
        if workers > self.limits.max_workers_per_pool {
            return Err(loadstone_core::Error::LimitExceeded {
                limit: "max_workers_per_pool",
                max: u64::from(self.limits.max_workers_per_pool),
                actual: u64::from(workers),
            }
            .into());
        }
        self.launched = true;

        // Publish the pre-range watermark before any worker can race us.
        // KeyRange keeps start above Key::MIN, so start - 1 exists.
        self.watermark
            .fetch_max(range.start().get() - 1, Ordering::AcqRel);

        let shared = Arc::new(WriterShared {
            store: Arc::clone(&self.store),
            table: self.config.table.clone(),
            multi_put: self.config.multi_put,
            limits: self.limits,
            generator: self.generator,
            cursor: KeyCursor::new(range),
            progress: Mutex::new(WriteProgress::new(
                range.start(),
                self.limits.max_pending_completions,
            )),
            watermark: Arc::clone(&self.watermark),
            keys_written: Arc::clone(&self.keys_written),
            keys_failed: Arc::clone(&self.keys_failed),
        });

        // Count every worker active before flipping the started flag, so
        // a linked reader can never observe a half-started pool as done.
        self.active.store(u64::from(workers), Ordering::Release);
        self.started.store(true, Ordering::Release);

        for worker in 0..workers {
            let worker = WorkerId::new(u64::from(worker));
            let shared = Arc::clone(&shared);
            let guard = ActiveGuard {
                active: Arc::clone(&self.active),
            };
            self.join_set
                .spawn(async move { run_worker(worker, shared, guard).await });
        }

        info!(workers, %range, multi_put = self.config.multi_put, "writer pool started");
        Ok(())
    }

    /// Waits for every worker to finish and returns the final counters.
    ///
    /// # Errors
    ///
    /// Returns `WorkerPanicked` if any worker panicked; remaining workers
    /// are still drained first.
    pub async fn wait_for_finish(&mut self) -> EngineResult<WriterSummary> {
        let mut first_panic = None;
        while let Some(joined) = self.join_set.join_next().await {
            if let Err(error) = joined {
                if first_panic.is_none() {
                    first_panic = Some(error.to_string());
                }
            }
        }
        if let Some(message) = first_panic {
            return Err(EngineError::WorkerPanicked {
                pool: "writer",
                message,
            });
        }
        Ok(self.summary())
    }

    /// Returns the published watermark: the highest key with every key
    /// at or below it written, [`Key::MIN`] before the pool starts.
    #[must_use]
    pub fn watermark(&self) -> Key {
        Key::new(self.watermark.load(Ordering::Acquire))
    }

    /// Returns a link readers can gate on.
    #[must_use]
    pub fn link(&self) -> WriterLink {
        WriterLink::new(
            Arc::clone(&self.watermark),
            Arc::clone(&self.active),
            Arc::clone(&self.started),
        )
    }

    /// Returns the counters as of now; final only after
    /// [`wait_for_finish`](Self::wait_for_finish).
    #[must_use]
    pub fn summary(&self) -> WriterSummary {
        WriterSummary {
            keys_written: self.keys_written.load(Ordering::Acquire),
            keys_failed: self.keys_failed.load(Ordering::Acquire),
            watermark: self.watermark(),
        }
    }
}

async fn run_worker<S: StoreClient>(
    worker: WorkerId,
    shared: Arc<WriterShared<S>>,
    guard: ActiveGuard,
) {
    let _guard = guard;

    while let Some(key) = shared.cursor.next_key() {
        let record = shared.generator.generate(key);
        debug_assert!(
            record.validate(&shared.limits).is_ok(),
            "generated record exceeds limits"
        );
        let result = if shared.multi_put {
            shared.store.put_record(&shared.table, &record).await
        } else {
            put_columns(&shared, &record).await
        };

        match result {
            Ok(()) => {
                let recorded = {
                    let mut progress = shared.progress.lock().expect("progress lock poisoned");
                    progress
                        .record_completion(key)
                        .map(|()| progress.watermark())
                };
                match recorded {
                    Ok(watermark) => {
                        // fetch_max: a worker publishing a stale watermark after
                        // losing the lock race must not move it backwards.
                        shared.watermark.fetch_max(watermark.get(), Ordering::AcqRel);
                        shared.keys_written.fetch_add(1, Ordering::Relaxed);
                        debug!(%worker, %key, columns = record.column_count(), "key written");
                    }
                    Err(error) => {
                        // The put landed, but the key can never fall below
                        // the watermark; count it with the failed keys.
                        shared.keys_failed.fetch_add(1, Ordering::Relaxed);
                        warn!(%worker, %key, %error, "completion rejected");
                    }
                }
            }
            Err(error) => {
                shared.keys_failed.fetch_add(1, Ordering::Relaxed);
                warn!(%worker, %key, %error, "write failed");
            }
        }
    }
    debug!(%worker, "writer finished");
}

// Column-by-column writes abandon the rest of the record on the first
// failure; the key counts as failed and never reaches the watermark.
async fn put_columns<S: StoreClient>(shared: &WriterShared<S>, record: &Record) -> StoreResult<()> {
    for (index, value) in record.columns() {
        shared
            .store
            .put_column(&shared.table, record.key(), index, value.clone())
            .await?;
    }
    Ok(())
}
