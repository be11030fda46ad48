//! Engine error types.

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors from configuring or running an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration was rejected.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying validation failure.
        #[from]
        source: loadstone_core::Error,
    },

    /// A worker task panicked or was cancelled.
    #[error("{pool} worker panicked: {message}")]
    WorkerPanicked {
        /// Which pool the worker belonged to.
        pool: &'static str,
        /// Join error detail.
        message: String,
    },
}
