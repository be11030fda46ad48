//! End-to-end scenarios: writer pools, reader pools, and both linked
//! over the simulated store.

use std::sync::Arc;

use loadstone_core::{ColumnIndex, Key, KeyRange, Limits};
use loadstone_store::{SimulatedStore, StoreClient, StoreFaultConfig};
use loadstone_workload::{
    Bounds, ReaderConfig, ReaderEngine, WriterConfig, WriterEngine, WriterSummary,
};

const TABLE: &str = "cluster_test";

fn writer_config() -> WriterConfig {
    WriterConfig {
        table: TABLE.to_string(),
        multi_put: true,
        columns: Bounds::new(1, 4).unwrap(),
        value_sizes: Bounds::new(10, 50).unwrap(),
    }
}

fn reader_config(verify_percent: u8) -> ReaderConfig {
    ReaderConfig {
        table: TABLE.to_string(),
        verify_percent,
        max_errors: 10,
        key_window: 0,
        columns: Bounds::new(1, 4).unwrap(),
        value_sizes: Bounds::new(10, 50).unwrap(),
        seed: 42,
    }
}

fn range(start: i64, end: i64) -> KeyRange {
    KeyRange::new(Key::new(start), Key::new(end)).unwrap()
}

async fn new_store(faults: StoreFaultConfig) -> Arc<SimulatedStore> {
    let store = Arc::new(SimulatedStore::with_faults(42, faults));
    store.create_table(TABLE).await.unwrap();
    store
}

async fn write_range(store: &Arc<SimulatedStore>, keys: KeyRange, workers: u32) -> WriterSummary {
    let mut writer =
        WriterEngine::new(Arc::clone(store), writer_config(), Limits::new()).unwrap();
    writer.start(keys, workers).unwrap();
    writer.wait_for_finish().await.unwrap()
}

#[tokio::test]
async fn test_writer_pool_covers_range() {
    let store = new_store(StoreFaultConfig::none()).await;
    let summary = write_range(&store, range(0, 100), 4).await;

    assert_eq!(summary.keys_written, 100);
    assert_eq!(summary.keys_failed, 0);
    assert_eq!(summary.watermark, Key::new(99));

    let snapshot = store.snapshot(TABLE).unwrap();
    assert_eq!(snapshot.row_count(), 100);
    for key in snapshot.keys() {
        let record = snapshot.record(key).unwrap();
        assert!(
            (1..=4).contains(&record.column_count()),
            "{key} has {} columns",
            record.column_count()
        );
    }
}

#[tokio::test]
async fn test_reader_pool_verifies_written_range() {
    let store = new_store(StoreFaultConfig::none()).await;
    write_range(&store, range(0, 100), 4).await;

    let mut reader = ReaderEngine::new(store, reader_config(100), Limits::new()).unwrap();
    reader.start(range(0, 100), 2).unwrap();
    let summary = reader.wait_for_finish().await.unwrap();

    assert_eq!(summary.keys_read, 100);
    assert_eq!(summary.verified_count, 100);
    assert_eq!(summary.error_count, 0);
    assert!(!summary.aborted);
}

#[tokio::test]
async fn test_corruption_is_detected() {
    let store = new_store(StoreFaultConfig::none()).await;
    write_range(&store, range(0, 100), 4).await;

    // Every record has at least one column, so column 0 always exists.
    assert!(store.corrupt_value(TABLE, Key::new(42), ColumnIndex::new(0)));

    let mut reader =
        ReaderEngine::new(Arc::clone(&store), reader_config(100), Limits::new()).unwrap();
    reader.start(range(0, 100), 2).unwrap();
    let summary = reader.wait_for_finish().await.unwrap();

    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.verified_count, 99);
    assert!(!summary.aborted);
}

#[tokio::test]
async fn test_deleted_row_is_detected() {
    let store = new_store(StoreFaultConfig::none()).await;
    write_range(&store, range(0, 50), 2).await;

    assert!(store.remove_row(TABLE, Key::new(7)));
    assert!(store.remove_value(TABLE, Key::new(9), ColumnIndex::new(0)));

    let mut reader =
        ReaderEngine::new(Arc::clone(&store), reader_config(100), Limits::new()).unwrap();
    reader.start(range(0, 50), 2).unwrap();
    let summary = reader.wait_for_finish().await.unwrap();

    assert_eq!(summary.error_count, 2);
    assert_eq!(summary.verified_count, 48);
}

#[tokio::test]
async fn test_zero_error_budget_aborts_on_first_corruption() {
    let store = new_store(StoreFaultConfig::none()).await;
    write_range(&store, range(0, 100), 4).await;
    assert!(store.corrupt_value(TABLE, Key::new(0), ColumnIndex::new(0)));

    let mut config = reader_config(100);
    config.max_errors = 0;
    let mut reader = ReaderEngine::new(store, config, Limits::new()).unwrap();

    // One worker claims keys in order: it must detect key 0 and stop
    // without claiming anything further.
    reader.start(range(0, 100), 1).unwrap();
    let summary = reader.wait_for_finish().await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.keys_read, 1);
    assert_eq!(summary.error_count, 1);
}

#[tokio::test]
async fn test_corruption_at_error_budget_completes() {
    let store = new_store(StoreFaultConfig::none()).await;
    write_range(&store, range(0, 50), 2).await;
    assert!(store.corrupt_value(TABLE, Key::new(0), ColumnIndex::new(0)));

    let mut config = reader_config(100);
    config.max_errors = 1;
    let mut reader = ReaderEngine::new(store, config, Limits::new()).unwrap();

    // Exactly max_errors errors: the pool keeps claiming to the end.
    reader.start(range(0, 50), 1).unwrap();
    let summary = reader.wait_for_finish().await.unwrap();

    assert!(!summary.aborted);
    assert_eq!(summary.keys_read, 50);
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.verified_count, 49);
}

#[tokio::test]
async fn test_corruption_past_error_budget_aborts() {
    let store = new_store(StoreFaultConfig::none()).await;
    write_range(&store, range(0, 50), 2).await;
    assert!(store.corrupt_value(TABLE, Key::new(0), ColumnIndex::new(0)));
    assert!(store.corrupt_value(TABLE, Key::new(1), ColumnIndex::new(0)));

    let mut config = reader_config(100);
    config.max_errors = 1;
    let mut reader = ReaderEngine::new(store, config, Limits::new()).unwrap();

    // One worker reads in key order: the second corrupt key pushes the
    // count past max_errors and the pool stops claiming.
    reader.start(range(0, 50), 1).unwrap();
    let summary = reader.wait_for_finish().await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.keys_read, 2);
    assert_eq!(summary.error_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_linked_run_with_window() {
    let store = new_store(StoreFaultConfig::none()).await;
    let keys = range(0, 100);

    let mut writer =
        WriterEngine::new(Arc::clone(&store), writer_config(), Limits::new()).unwrap();
    let mut config = reader_config(100);
    config.key_window = 10;
    let mut reader = ReaderEngine::new(store, config, Limits::new()).unwrap();
    reader.link_to_writer(writer.link()).unwrap();

    writer.start(keys, 4).unwrap();
    reader.start(keys, 2).unwrap();

    let write_summary = writer.wait_for_finish().await.unwrap();
    let read_summary = reader.wait_for_finish().await.unwrap();

    assert_eq!(write_summary.keys_written, 100);
    assert_eq!(write_summary.watermark, Key::new(99));

    // The final watermark is 99, so keys 90..100 stay out of the window
    // and the pool winds down without touching them.
    assert_eq!(read_summary.keys_read, 90);
    assert_eq!(read_summary.verified_count, 90);
    assert_eq!(read_summary.error_count, 0);
    assert!(!read_summary.aborted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_linked_run_without_window_reads_everything() {
    let store = new_store(StoreFaultConfig::none()).await;
    let keys = range(0, 100);

    let mut writer =
        WriterEngine::new(Arc::clone(&store), writer_config(), Limits::new()).unwrap();
    let mut reader = ReaderEngine::new(store, reader_config(100), Limits::new()).unwrap();
    reader.link_to_writer(writer.link()).unwrap();

    writer.start(keys, 4).unwrap();
    reader.start(keys, 4).unwrap();

    writer.wait_for_finish().await.unwrap();
    let read_summary = reader.wait_for_finish().await.unwrap();

    assert_eq!(read_summary.keys_read, 100);
    assert_eq!(read_summary.verified_count, 100);
    assert_eq!(read_summary.error_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_linked_run_over_negative_keys() {
    let store = new_store(StoreFaultConfig::none()).await;
    let keys = range(-25, 25);

    let mut writer =
        WriterEngine::new(Arc::clone(&store), writer_config(), Limits::new()).unwrap();
    let mut reader = ReaderEngine::new(store, reader_config(100), Limits::new()).unwrap();
    reader.link_to_writer(writer.link()).unwrap();

    writer.start(keys, 2).unwrap();
    reader.start(keys, 2).unwrap();

    let write_summary = writer.wait_for_finish().await.unwrap();
    let read_summary = reader.wait_for_finish().await.unwrap();

    assert_eq!(write_summary.watermark, Key::new(24));
    assert_eq!(read_summary.verified_count, 50);
    assert_eq!(read_summary.error_count, 0);
}

#[tokio::test]
async fn test_flaky_puts_pin_watermark_at_first_failure() {
    let store = new_store(StoreFaultConfig::none().with_put_fail_rate(0.2)).await;

    // One worker writes keys in order, so the watermark must end exactly
    // below the first injected failure.
    let summary = write_range(&store, range(0, 100), 1).await;

    assert!(summary.keys_failed > 0);
    assert_eq!(summary.keys_written + summary.keys_failed, 100);
    assert!(summary.watermark < Key::new(99));

    let snapshot = store.snapshot(TABLE).unwrap();
    assert_eq!(snapshot.row_count() as u64, summary.keys_written);
}

#[tokio::test]
async fn test_column_mode_and_multi_put_produce_identical_tables() {
    let record_store = new_store(StoreFaultConfig::none()).await;
    write_range(&record_store, range(0, 30), 2).await;

    let column_store = new_store(StoreFaultConfig::none()).await;
    let mut config = writer_config();
    config.multi_put = false;
    let mut writer =
        WriterEngine::new(Arc::clone(&column_store), config, Limits::new()).unwrap();
    writer.start(range(0, 30), 2).unwrap();
    writer.wait_for_finish().await.unwrap();

    let records = record_store.snapshot(TABLE).unwrap();
    let columns = column_store.snapshot(TABLE).unwrap();
    assert_eq!(records.row_count(), columns.row_count());
    for key in records.keys() {
        assert_eq!(records.record(key), columns.record(key));
    }
}
