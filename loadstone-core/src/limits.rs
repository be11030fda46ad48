//! Explicit limits on all operations.
//!
//! Every loop and every collection in the engine is bounded by one of
//! these values. Limits are fixed at startup and never change while a
//! run is in flight.

/// Limits applied across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of columns a single record may carry.
    pub max_columns_per_key: u32,

    /// Maximum size of a single column value in bytes.
    pub max_value_bytes: u32,

    /// Maximum number of workers in one pool.
    pub max_workers_per_pool: u32,

    /// Maximum span of out-of-order completions the watermark tracker
    /// may hold. Completions landing past the span are rejected and
    /// their keys count as failed.
    pub max_pending_completions: u64,

    /// Maximum key window a reader may trail a linked writer by.
    pub max_key_window: u64,
}

impl Limits {
    /// Creates limits with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_columns_per_key: 256,
            max_value_bytes: 1024 * 1024,
            max_workers_per_pool: 1024,
            max_pending_completions: 1_000_000,
            max_key_window: 1_000_000,
        }
    }

    /// Validates that the limits are internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any limit is zero or incoherent.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_columns_per_key == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_columns_per_key",
                reason: "must be > 0",
            });
        }
        if self.max_value_bytes == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_value_bytes",
                reason: "must be > 0",
            });
        }
        if self.max_workers_per_pool == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_workers_per_pool",
                reason: "must be > 0",
            });
        }
        if self.max_pending_completions == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_pending_completions",
                reason: "must be > 0",
            });
        }
        if self.max_pending_completions > u64::from(u32::MAX) {
            return Err(crate::Error::InvalidArgument {
                name: "max_pending_completions",
                reason: "must fit bitmap index",
            });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_validate() {
        let limits = Limits::new();
        assert!(limits.validate().is_ok());
        assert_eq!(limits.max_columns_per_key, 256);
        assert_eq!(limits.max_value_bytes, 1024 * 1024);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut limits = Limits::new();
        limits.max_columns_per_key = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_oversized_pending_rejected() {
        let mut limits = Limits::new();
        limits.max_pending_completions = u64::from(u32::MAX) + 1;
        assert!(limits.validate().is_err());
    }
}
