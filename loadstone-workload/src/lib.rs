//! Loadstone Workload - Concurrent write and read/verify engines.
//!
//! A run partitions a key range across a pool of writer workers, each
//! generating records deterministically from the key, while a tracker
//! turns out-of-order completions into a contiguous-prefix watermark.
//! A reader pool, optionally gated on that watermark, reads keys back
//! and verifies a sampled percentage against the same generation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod generator;
mod link;
pub mod profiles;
mod reader;
mod value;
mod verification;
mod writer;

pub use error::{EngineError, EngineResult};
pub use generator::{Bounds, RecordGenerator};
pub use link::WriterLink;
pub use reader::{ErrorStats, ReaderConfig, ReaderEngine, ReaderSummary};
pub use value::{ColumnValue, ValueError, VALUE_HEADER_SIZE};
pub use verification::{compare_record, Mismatch, ValueDiagnosis};
pub use writer::{WriterConfig, WriterEngine, WriterSummary};
