//! Store client trait.

use async_trait::async_trait;
use bytes::Bytes;
use loadstone_core::{ColumnIndex, Key, Record};

use crate::StoreResult;

/// Abstraction over a sorted key-value store with columns.
///
/// Implementations must be safe to share across worker tasks; engines
/// hold the client in an `Arc` and call it concurrently.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Creates `table` if it does not already exist.
    async fn create_table(&self, table: &str) -> StoreResult<()>;

    /// Writes all of a record's columns atomically.
    async fn put_record(&self, table: &str, record: &Record) -> StoreResult<()>;

    /// Writes a single column value.
    async fn put_column(
        &self,
        table: &str,
        key: Key,
        index: ColumnIndex,
        value: Bytes,
    ) -> StoreResult<()>;

    /// Reads the full record at `key`, or `None` if the key is absent.
    async fn get_record(&self, table: &str, key: Key) -> StoreResult<Option<Record>>;
}
