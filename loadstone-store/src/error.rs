//! Store error types.

use loadstone_core::Key;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The named table does not exist.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Name of the missing table.
        table: String,
    },

    /// A write for `key` failed.
    #[error("put failed for {key}: {message}")]
    PutFailed {
        /// Key the write targeted.
        key: Key,
        /// Backend-specific failure detail.
        message: String,
    },

    /// A read for `key` failed.
    #[error("get failed for {key}: {message}")]
    GetFailed {
        /// Key the read targeted.
        key: Key,
        /// Backend-specific failure detail.
        message: String,
    },
}
