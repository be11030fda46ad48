//! Named run profiles.
//!
//! A profile bundles a complete run configuration: key range, table,
//! and per-pool settings. Profiles load from TOML files or from the
//! built-in set, and every field falls back to its default when a file
//! leaves it out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Writer pool settings within a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterProfile {
    /// Whether the run includes a writer pool.
    pub enabled: bool,
    /// Worker count.
    pub workers: u32,
    /// Average columns per key; actual counts span `[1, 2 * avg]`.
    pub avg_columns: u32,
    /// Average value size in bytes; actual sizes span `[avg / 2, avg * 3 / 2]`.
    pub avg_value_size: u32,
    /// Write whole records in one call instead of column-by-column.
    pub multi_put: bool,
}

impl Default for WriterProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 20,
            avg_columns: 4,
            avg_value_size: 512,
            multi_put: false,
        }
    }
}

/// Reader pool settings within a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderProfile {
    /// Whether the run includes a reader pool.
    pub enabled: bool,
    /// Worker count.
    pub workers: u32,
    /// Percentage of claimed keys to verify.
    pub verify_percent: u8,
    /// How far the watermark must trail past a key before reading it.
    pub key_window: u64,
    /// Errors tolerated before the pool aborts.
    pub max_errors: u64,
}

impl Default for ReaderProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 20,
            verify_percent: 100,
            key_window: 0,
            max_errors: 10,
        }
    }
}

/// A complete run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProfile {
    /// Profile name, for logs and summaries.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// First key of the run.
    pub start_key: i64,
    /// Number of keys in the run.
    pub num_keys: u64,
    /// Table the run targets.
    pub table: String,
    /// Writer pool settings.
    pub writer: WriterProfile,
    /// Reader pool settings.
    pub reader: ReaderProfile,
}

impl Default for RunProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: String::new(),
            start_key: 0,
            num_keys: 1_000,
            table: "cluster_test".to_string(),
            writer: WriterProfile::default(),
            reader: ReaderProfile::default(),
        }
    }
}

impl RunProfile {
    /// Loads a profile from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read or `Parse` if it is not
    /// valid profile TOML.
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parses a profile from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the text is not valid profile TOML.
    pub fn from_toml(contents: &str) -> Result<Self, ProfileError> {
        toml::from_str(contents).map_err(|error| ProfileError::Parse {
            message: error.to_string(),
        })
    }

    /// Serializes the profile to TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if serialization fails.
    pub fn to_toml(&self) -> Result<String, ProfileError> {
        toml::to_string_pretty(self).map_err(|error| ProfileError::Parse {
            message: error.to_string(),
        })
    }
}

/// Errors from loading profiles.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The profile file could not be read.
    #[error("failed to read profile file {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The profile contents could not be parsed.
    #[error("failed to parse profile: {message}")]
    Parse {
        /// Parser detail.
        message: String,
    },

    /// No built-in profile has this name.
    #[error("unknown profile: {name}")]
    NotFound {
        /// The requested name.
        name: String,
    },
}

/// Returns the built-in profiles, keyed by name.
#[must_use]
pub fn builtin_profiles() -> HashMap<&'static str, RunProfile> {
    let mut profiles = HashMap::new();

    profiles.insert(
        "smoke",
        RunProfile {
            name: "smoke".to_string(),
            description: "Quick end-to-end check with full verification".to_string(),
            num_keys: 1_000,
            writer: WriterProfile {
                workers: 4,
                avg_columns: 2,
                avg_value_size: 128,
                ..WriterProfile::default()
            },
            reader: ReaderProfile {
                workers: 4,
                ..ReaderProfile::default()
            },
            ..RunProfile::default()
        },
    );

    profiles.insert(
        "load",
        RunProfile {
            name: "load".to_string(),
            description: "Sustained write pressure with sampled verification".to_string(),
            num_keys: 1_000_000,
            reader: ReaderProfile {
                verify_percent: 10,
                key_window: 100,
                ..ReaderProfile::default()
            },
            ..RunProfile::default()
        },
    );

    profiles.insert(
        "soak",
        RunProfile {
            name: "soak".to_string(),
            description: "Long run with light verification and a wide window".to_string(),
            num_keys: 10_000_000,
            writer: WriterProfile {
                avg_value_size: 1024,
                ..WriterProfile::default()
            },
            reader: ReaderProfile {
                verify_percent: 1,
                key_window: 1_000,
                max_errors: 100,
                ..ReaderProfile::default()
            },
            ..RunProfile::default()
        },
    );

    profiles.insert(
        "verify-only",
        RunProfile {
            name: "verify-only".to_string(),
            description: "Re-verify previously written keys without writing".to_string(),
            num_keys: 1_000_000,
            writer: WriterProfile {
                enabled: false,
                ..WriterProfile::default()
            },
            ..RunProfile::default()
        },
    );

    profiles
}

/// Looks up a built-in profile by name.
///
/// # Errors
///
/// Returns `NotFound` if no built-in profile has this name.
pub fn load_profile(name: &str) -> Result<RunProfile, ProfileError> {
    builtin_profiles()
        .remove(name)
        .ok_or_else(|| ProfileError::NotFound {
            name: name.to_string(),
        })
}

/// Lists built-in profile names, sorted.
#[must_use]
pub fn list_profiles() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = builtin_profiles().into_keys().collect();
    names.sort_unstable();
    names
}
