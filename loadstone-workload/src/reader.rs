//! Concurrent reader pool with sampled verification.
//!
//! Workers claim keys from a shared cursor and read every claimed key.
//! A configurable percentage of claimed keys is also verified against
//! the deterministic generation. When linked to a writer pool, a key is
//! only claimed once the writers' watermark has moved `key_window` keys
//! past it, so reads land on settled data.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loadstone_core::{Key, KeyRange, Limits, WorkerId};
use loadstone_progress::KeyCursor;
use loadstone_store::StoreClient;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::generator::{Bounds, RecordGenerator, GOLDEN_MULTIPLIER};
use crate::link::WriterLink;
use crate::verification::compare_record;
use crate::{EngineError, EngineResult};

// How long a blocked worker naps before re-reading the watermark.
const WATERMARK_POLL: Duration = Duration::from_millis(10);

/// Configuration for a reader pool.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Table to read from.
    pub table: String,
    /// Percentage of claimed keys to verify, `0..=100`.
    pub verify_percent: u8,
    /// Errors tolerated before the pool aborts. The pool aborts once the
    /// error count exceeds this value.
    pub max_errors: u64,
    /// How far the writer watermark must be past a key before a linked
    /// reader claims it.
    pub key_window: u64,
    /// Bounds on columns per key; must match the writer's.
    pub columns: Bounds,
    /// Bounds on value sizes; must match the writer's.
    pub value_sizes: Bounds,
    /// Seed for the verification sampling draw.
    pub seed: u64,
}

impl ReaderConfig {
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
        if self.verify_percent > 100 {
            return Err(loadstone_core::Error::InvalidArgument {
                name: "verify_percent",
                reason: "must be <= 100",
            });
        }
        if self.key_window > limits.max_key_window {
            return Err(loadstone_core::Error::LimitExceeded {
                limit: "max_key_window",
                max: limits.max_key_window,
                actual: self.key_window,
            });
        }
        // Mirrors the writer: no record is ever generated with zero
        // columns, so expected records must not be either.
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

/// Live verification counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStats {
    /// Keys verified clean.
    pub verified_count: u64,
    /// Keys that failed: read errors plus verification mismatches.
    pub error_count: u64,
}

/// Final counters for a completed reader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSummary {
    /// Keys claimed and read.
    pub keys_read: u64,
    /// Keys verified clean.
    pub verified_count: u64,
    /// Keys that failed: read errors plus verification mismatches.
    pub error_count: u64,
    /// True if the pool stopped early on the error threshold.
    pub aborted: bool,
}

impl ReaderSummary {
    /// Prints the summary to stdout.
    pub fn print(&self) {
        println!("=== Reader Summary ===");
        println!("Keys read:     {}", self.keys_read);
        println!("Keys verified: {}", self.verified_count);
        println!("Read errors:   {}", self.error_count);
        println!("Aborted:       {}", self.aborted);
    }
}

// State shared between the engine handle and its workers.
struct ReaderShared<S> {
    store: Arc<S>,
    table: String,
    verify_percent: u8,
    max_errors: u64,
    key_window: u64,
    seed: u64,
    generator: RecordGenerator,
    cursor: KeyCursor,
    link: Option<WriterLink>,
    keys_read: Arc<AtomicU64>,
    verified: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    aborted: Arc<AtomicBool>,
}

/// A pool of reader workers over a key range.
pub struct ReaderEngine<S: StoreClient + 'static> {
    store: Arc<S>,
    config: ReaderConfig,
    limits: Limits,
    generator: RecordGenerator,
    link: Option<WriterLink>,
    keys_read: Arc<AtomicU64>,
    verified: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    aborted: Arc<AtomicBool>,
    join_set: JoinSet<()>,
    launched: bool,
}

impl<S: StoreClient + 'static> ReaderEngine<S> {
    /// Creates a reader pool. Workers are not spawned until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` or `limits` is invalid.
    pub fn new(store: Arc<S>, config: ReaderConfig, limits: Limits) -> EngineResult<Self> {
        limits.validate()?;
        config.validate(&limits)?;

        let generator = RecordGenerator::new(config.columns, config.value_sizes);
        Ok(Self {
            store,
            config,
            limits,
            generator,
            link: None,
            keys_read: Arc::new(AtomicU64::new(0)),
            verified: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            aborted: Arc::new(AtomicBool::new(false)),
            join_set: JoinSet::new(),
            launched: false,
        })
    }

    /// Gates this pool on a writer pool's watermark. Without a link,
    /// readers claim keys unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool already started.
    pub fn link_to_writer(&mut self, link: WriterLink) -> EngineResult<()> {
        if self.launched {
            return Err(loadstone_core::Error::InvalidState {
                current: "started",
                required: "idle",
            }
            .into());
        }
        self.link = Some(link);
        Ok(())
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

        let shared = Arc::new(ReaderShared {
            store: Arc::clone(&self.store),
            table: self.config.table.clone(),
            verify_percent: self.config.verify_percent,
            max_errors: self.config.max_errors,
            key_window: self.config.key_window,
            seed: self.config.seed,
            generator: self.generator,
            cursor: KeyCursor::new(range),
            link: self.link.clone(),
            keys_read: Arc::clone(&self.keys_read),
            verified: Arc::clone(&self.verified),
            errors: Arc::clone(&self.errors),
            aborted: Arc::clone(&self.aborted),
        });

        for worker in 0..workers {
            let worker = WorkerId::new(u64::from(worker));
            let shared = Arc::clone(&shared);
            self.join_set
                .spawn(async move { run_worker(worker, shared).await });
        }

        info!(
            workers,
            %range,
            verify_percent = self.config.verify_percent,
            key_window = self.config.key_window,
            linked = self.link.is_some(),
            "reader pool started"
        );
        Ok(())
    }

    /// Waits for every worker to finish and returns the final counters.
    ///
    /// # Errors
    ///
    /// Returns `WorkerPanicked` if any worker panicked; remaining workers
    /// are still drained first.
    pub async fn wait_for_finish(&mut self) -> EngineResult<ReaderSummary> {
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
                pool: "reader",
                message,
            });
        }
        Ok(self.summary())
    }

    /// Returns the live verification counters.
    #[must_use]
    pub fn stats(&self) -> ErrorStats {
        ErrorStats {
            verified_count: self.verified.load(Ordering::Acquire),
            error_count: self.errors.load(Ordering::Acquire),
        }
    }

    /// Returns the counters as of now; final only after
    /// [`wait_for_finish`](Self::wait_for_finish).
    #[must_use]
    pub fn summary(&self) -> ReaderSummary {
        ReaderSummary {
            keys_read: self.keys_read.load(Ordering::Acquire),
            verified_count: self.verified.load(Ordering::Acquire),
            error_count: self.errors.load(Ordering::Acquire),
            aborted: self.aborted.load(Ordering::Acquire),
        }
    }
}

fn window_satisfied(watermark: Key, key: Key, window: u64) -> bool {
    // Overflow past the key space means the window can never open.
    key.checked_add(window)
        .is_some_and(|threshold| watermark >= threshold)
}

async fn run_worker<S: StoreClient>(worker: WorkerId, shared: Arc<ReaderShared<S>>) {
    let mut rng = ChaCha8Rng::seed_from_u64(
        shared
            .seed
            .wrapping_add(worker.get())
            .wrapping_mul(GOLDEN_MULTIPLIER),
    );

    'claims: loop {
        if shared.aborted.load(Ordering::Acquire) {
            debug!(%worker, "reader stopping: pool aborted");
            break;
        }
        let Some(key) = shared.cursor.peek() else {
            break;
        };

        if let Some(link) = &shared.link {
            // Wait for the window before claiming, so a key that never
            // becomes readable is never consumed from the cursor.
            loop {
                if window_satisfied(link.watermark(), key, shared.key_window) {
                    break;
                }
                if link.is_done() {
                    // Writers publish their final watermark before the
                    // active count drains, so this re-read is conclusive.
                    if window_satisfied(link.watermark(), key, shared.key_window) {
                        break;
                    }
                    debug!(%worker, %key, "reader stopping: writers done, window closed");
                    break 'claims;
                }
                if shared.aborted.load(Ordering::Acquire) {
                    break 'claims;
                }
                tokio::time::sleep(WATERMARK_POLL).await;
            }
        }

        if !shared.cursor.try_claim(key) {
            continue; // another worker took it; re-evaluate
        }

        // The sampling draw happens after the window wait, once the key
        // is committed to being read.
        let verify = rng.gen_range(0..100_u32) < u32::from(shared.verify_percent);
        let fetched = shared.store.get_record(&shared.table, key).await;
        shared.keys_read.fetch_add(1, Ordering::Relaxed);

        let failed = match fetched {
            Err(error) => {
                warn!(%worker, %key, %error, "read failed");
                true
            }
            Ok(actual) => {
                if verify {
                    let expected = shared.generator.generate(key);
                    let mismatches = compare_record(&expected, actual.as_ref());
                    if mismatches.is_empty() {
                        shared.verified.fetch_add(1, Ordering::Relaxed);
                        debug!(%worker, %key, "key verified");
                        false
                    } else {
                        for mismatch in &mismatches {
                            warn!(%worker, %key, %mismatch, "verification failed");
                        }
                        true
                    }
                } else {
                    false
                }
            }
        };

        if failed {
            let errors = shared.errors.fetch_add(1, Ordering::AcqRel) + 1;
            if errors > shared.max_errors && !shared.aborted.swap(true, Ordering::AcqRel) {
                warn!(
                    errors,
                    max_errors = shared.max_errors,
                    "error threshold exceeded, aborting reader pool"
                );
            }
        }
    }
    debug!(%worker, "reader finished");
}
