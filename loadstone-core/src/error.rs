//! Error types for core operations.

use std::fmt;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core validation and construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An argument failed validation.
    InvalidArgument {
        /// Name of the offending argument.
        name: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A configured limit was exceeded.
    LimitExceeded {
        /// Name of the limit.
        limit: &'static str,
        /// The configured maximum.
        max: u64,
        /// The observed value.
        actual: u64,
    },

    /// An operation was attempted in the wrong state.
    InvalidState {
        /// The state the component is in.
        current: &'static str,
        /// The state the operation requires.
        required: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { name, reason } => {
                write!(f, "invalid argument '{name}': {reason}")
            }
            Self::LimitExceeded { limit, max, actual } => {
                write!(f, "limit exceeded: {limit} (max={max}, actual={actual})")
            }
            Self::InvalidState { current, required } => {
                write!(f, "invalid state: in {current}, need {required}")
            }
        }
    }
}

impl std::error::Error for Error {}
