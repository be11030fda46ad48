//! In-process simulated store with deterministic fault injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use loadstone_core::{ColumnIndex, Key, Record};

use crate::{StoreClient, StoreError, StoreResult};

/// Fault injection knobs for the simulated store.
///
/// Rates inject failures deterministically from the store's seed, so a
/// given seed and operation sequence always fails at the same points.
/// Force flags fail exactly one upcoming operation, then clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreFaultConfig {
    /// Fraction of puts that fail, in `[0.0, 1.0]`.
    pub put_fail_rate: f64,
    /// Fraction of gets that fail, in `[0.0, 1.0]`.
    pub get_fail_rate: f64,
    /// Fails the next put, then clears.
    pub force_put_fail: bool,
    /// Fails the next get, then clears.
    pub force_get_fail: bool,
}

impl StoreFaultConfig {
    /// No faults.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            put_fail_rate: 0.0,
            get_fail_rate: 0.0,
            force_put_fail: false,
            force_get_fail: false,
        }
    }

    /// A mildly unreliable store: 1% of puts and gets fail.
    #[must_use]
    pub const fn flaky() -> Self {
        Self {
            put_fail_rate: 0.01,
            get_fail_rate: 0.01,
            force_put_fail: false,
            force_get_fail: false,
        }
    }

    /// Sets the put failure rate.
    ///
    /// # Panics
    /// Panics if `rate` is outside `[0.0, 1.0]`.
    #[must_use]
    pub fn with_put_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in [0.0, 1.0]");
        self.put_fail_rate = rate;
        self
    }

    /// Sets the get failure rate.
    ///
    /// # Panics
    /// Panics if `rate` is outside `[0.0, 1.0]`.
    #[must_use]
    pub fn with_get_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in [0.0, 1.0]");
        self.get_fail_rate = rate;
        self
    }

    /// Arms a one-shot put failure.
    #[must_use]
    pub const fn with_force_put_fail(mut self) -> Self {
        self.force_put_fail = true;
        self
    }

    /// Arms a one-shot get failure.
    #[must_use]
    pub const fn with_force_get_fail(mut self) -> Self {
        self.force_get_fail = true;
        self
    }
}

impl Default for StoreFaultConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// One table's rows, sorted by key.
#[derive(Debug, Default, Clone)]
pub struct SimulatedTable {
    rows: BTreeMap<Key, BTreeMap<ColumnIndex, Bytes>>,
}

impl SimulatedTable {
    /// Returns the number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the record at `key`, if present.
    #[must_use]
    pub fn record(&self, key: Key) -> Option<Record> {
        self.rows
            .get(&key)
            .map(|columns| Record::with_columns(key, columns.clone()))
    }

    /// Iterates over row keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.rows.keys().copied()
    }
}

/// An in-memory store for tests and local runs.
///
/// Clones share the same tables and fault state, so a store can be
/// handed to engines while the test keeps a handle for inspection.
#[derive(Debug, Clone)]
pub struct SimulatedStore {
    tables: Arc<Mutex<HashMap<String, SimulatedTable>>>,
    fault_config: Arc<Mutex<StoreFaultConfig>>,
    seed: u64,
    op_counter: Arc<AtomicU64>,
}

impl SimulatedStore {
    /// Creates a store with no fault injection.
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(0, StoreFaultConfig::none())
    }

    /// Creates a store that injects faults per `config`, deterministically
    /// derived from `seed`.
    #[must_use]
    pub fn with_faults(seed: u64, config: StoreFaultConfig) -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            op_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a guard over the live fault configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn fault_config(&self) -> MutexGuard<'_, StoreFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Deterministic per-operation fault decision. Each rated operation
    /// consumes one counter tick regardless of which table or key it
    /// touches, so a seed fixes the exact failure points of a run.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let tick = self.op_counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(tick)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash >> 11) as f64 / (1u64 << 53) as f64;
        normalized < rate
    }

    fn put_fault(&self) -> Option<&'static str> {
        let rate = {
            let mut config = self.fault_config();
            if config.force_put_fail {
                config.force_put_fail = false;
                return Some("simulated put failure (forced)");
            }
            config.put_fail_rate
        };
        if self.should_inject_fault(rate) {
            return Some("simulated put failure (random)");
        }
        None
    }

    fn get_fault(&self) -> Option<&'static str> {
        let rate = {
            let mut config = self.fault_config();
            if config.force_get_fail {
                config.force_get_fail = false;
                return Some("simulated get failure (forced)");
            }
            config.get_fail_rate
        };
        if self.should_inject_fault(rate) {
            return Some("simulated get failure (random)");
        }
        None
    }

    // ---------------------------------------------------------------------
    // Test hooks
    // ---------------------------------------------------------------------

    /// Flips every byte of the value at `(key, index)`. Returns true if
    /// the value existed.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn corrupt_value(&self, table: &str, key: Key, index: ColumnIndex) -> bool {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        let Some(columns) = tables.get_mut(table).and_then(|t| t.rows.get_mut(&key)) else {
            return false;
        };
        let Some(value) = columns.get_mut(&index) else {
            return false;
        };
        let corrupted: Bytes = value.iter().map(|byte| byte ^ 0xFF).collect();
        *value = corrupted;
        true
    }

    /// Removes the value at `(key, index)`. Returns true if it existed.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn remove_value(&self, table: &str, key: Key, index: ColumnIndex) -> bool {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&key))
            .and_then(|columns| columns.remove(&index))
            .is_some()
    }

    /// Removes the whole row at `key`. Returns true if it existed.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn remove_row(&self, table: &str, key: Key) -> bool {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        tables
            .get_mut(table)
            .and_then(|t| t.rows.remove(&key))
            .is_some()
    }

    /// Returns a copy of `table`'s current contents, or `None` if the
    /// table does not exist.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn snapshot(&self, table: &str) -> Option<SimulatedTable> {
        let tables = self.tables.lock().expect("tables lock poisoned");
        tables.get(table).cloned()
    }
}

impl Default for SimulatedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for SimulatedStore {
    async fn create_table(&self, table: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn put_record(&self, table: &str, record: &Record) -> StoreResult<()> {
        // Assert preconditions.
        assert!(!record.is_empty(), "record must have columns");

        if let Some(message) = self.put_fault() {
            return Err(StoreError::PutFailed {
                key: record.key(),
                message: message.to_string(),
            });
        }

        let mut tables = self.tables.lock().expect("tables lock poisoned");
        let Some(stored) = tables.get_mut(table) else {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        };
        let row = stored.rows.entry(record.key()).or_default();
        for (index, value) in record.columns() {
            row.insert(index, value.clone());
        }
        Ok(())
    }

    async fn put_column(
        &self,
        table: &str,
        key: Key,
        index: ColumnIndex,
        value: Bytes,
    ) -> StoreResult<()> {
        if let Some(message) = self.put_fault() {
            return Err(StoreError::PutFailed {
                key,
                message: message.to_string(),
            });
        }

        let mut tables = self.tables.lock().expect("tables lock poisoned");
        let Some(stored) = tables.get_mut(table) else {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        };
        stored.rows.entry(key).or_default().insert(index, value);
        Ok(())
    }

    async fn get_record(&self, table: &str, key: Key) -> StoreResult<Option<Record>> {
        if let Some(message) = self.get_fault() {
            return Err(StoreError::GetFailed {
                key,
                message: message.to_string(),
            });
        }

        let tables = self.tables.lock().expect("tables lock poisoned");
        let Some(stored) = tables.get(table) else {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        };
        Ok(stored.record(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "test_table";

    fn record_with(key: i64, values: &[(u64, &'static [u8])]) -> Record {
        let mut record = Record::new(Key::new(key));
        for &(index, value) in values {
            record.insert(ColumnIndex::new(index), Bytes::from_static(value));
        }
        record
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        let record = record_with(1, &[(0, b"alpha"), (1, b"beta")]);
        store.put_record(TABLE, &record).await.unwrap();

        let fetched = store.get_record(TABLE, Key::new(1)).await.unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        let fetched = store.get_record(TABLE, Key::new(99)).await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let store = SimulatedStore::new();

        let record = record_with(1, &[(0, b"x")]);
        assert!(matches!(
            store.put_record("no_such", &record).await,
            Err(StoreError::TableNotFound { .. })
        ));
        assert!(matches!(
            store.get_record("no_such", Key::new(1)).await,
            Err(StoreError::TableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_table_is_idempotent() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        let record = record_with(1, &[(0, b"keep")]);
        store.put_record(TABLE, &record).await.unwrap();
        store.create_table(TABLE).await.unwrap();

        let fetched = store.get_record(TABLE, Key::new(1)).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_put_column_merges_into_row() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        store
            .put_column(TABLE, Key::new(5), ColumnIndex::new(0), Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .put_column(TABLE, Key::new(5), ColumnIndex::new(1), Bytes::from_static(b"b"))
            .await
            .unwrap();

        let fetched = store.get_record(TABLE, Key::new(5)).await.unwrap().unwrap();
        assert_eq!(fetched.column_count(), 2);
    }

    #[tokio::test]
    async fn test_forced_put_failure_is_one_shot() {
        let store = SimulatedStore::with_faults(0, StoreFaultConfig::none().with_force_put_fail());
        store.create_table(TABLE).await.unwrap();

        let record = record_with(1, &[(0, b"x")]);
        let first = store.put_record(TABLE, &record).await;
        assert!(matches!(first, Err(StoreError::PutFailed { .. })));

        // The flag clears after one failure.
        store.put_record(TABLE, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_forced_get_failure_is_one_shot() {
        let store = SimulatedStore::with_faults(0, StoreFaultConfig::none().with_force_get_fail());
        store.create_table(TABLE).await.unwrap();

        let first = store.get_record(TABLE, Key::new(1)).await;
        assert!(matches!(first, Err(StoreError::GetFailed { .. })));

        // The flag clears after one failure.
        assert_eq!(store.get_record(TABLE, Key::new(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_full_fail_rate_fails_every_get() {
        let store =
            SimulatedStore::with_faults(0, StoreFaultConfig::none().with_get_fail_rate(1.0));
        store.create_table(TABLE).await.unwrap();

        for _ in 0..3 {
            assert!(matches!(
                store.get_record(TABLE, Key::new(1)).await,
                Err(StoreError::GetFailed { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_zero_fail_rate_never_fails() {
        let store = SimulatedStore::with_faults(0, StoreFaultConfig::none());
        store.create_table(TABLE).await.unwrap();

        for key in 0..50 {
            let record = record_with(key, &[(0, b"v")]);
            store.put_record(TABLE, &record).await.unwrap();
            store.get_record(TABLE, Key::new(key)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_fault_injection_is_deterministic() {
        let config = StoreFaultConfig::none().with_put_fail_rate(0.5);
        let record = record_with(1, &[(0, b"x")]);

        let mut failures = Vec::new();
        for run in 0..2 {
            let store = SimulatedStore::with_faults(7, config);
            store.create_table(TABLE).await.unwrap();
            let mut failed: Vec<usize> = Vec::new();
            for op in 0..20 {
                if store.put_record(TABLE, &record).await.is_err() {
                    failed.push(op);
                }
            }
            assert!(!failed.is_empty(), "run {run} injected no faults");
            failures.push(failed);
        }
        assert_eq!(failures[0], failures[1]);
    }

    #[tokio::test]
    async fn test_corrupt_value_changes_stored_bytes() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        let record = record_with(1, &[(0, b"payload")]);
        store.put_record(TABLE, &record).await.unwrap();

        assert!(store.corrupt_value(TABLE, Key::new(1), ColumnIndex::new(0)));
        let fetched = store.get_record(TABLE, Key::new(1)).await.unwrap().unwrap();
        assert_ne!(
            fetched.get(ColumnIndex::new(0)),
            record.get(ColumnIndex::new(0))
        );

        // Corrupting a missing value reports false.
        assert!(!store.corrupt_value(TABLE, Key::new(2), ColumnIndex::new(0)));
    }

    #[tokio::test]
    async fn test_remove_hooks() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        let record = record_with(1, &[(0, b"a"), (1, b"b")]);
        store.put_record(TABLE, &record).await.unwrap();

        assert!(store.remove_value(TABLE, Key::new(1), ColumnIndex::new(0)));
        let fetched = store.get_record(TABLE, Key::new(1)).await.unwrap().unwrap();
        assert_eq!(fetched.column_count(), 1);

        assert!(store.remove_row(TABLE, Key::new(1)));
        let fetched = store.get_record(TABLE, Key::new(1)).await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = SimulatedStore::new();
        store.create_table(TABLE).await.unwrap();

        let clone = store.clone();
        let record = record_with(1, &[(0, b"shared")]);
        clone.put_record(TABLE, &record).await.unwrap();

        let fetched = store.get_record(TABLE, Key::new(1)).await.unwrap();
        assert!(fetched.is_some());

        let snapshot = store.snapshot(TABLE).unwrap();
        assert_eq!(snapshot.row_count(), 1);
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec![Key::new(1)]);
    }
}
