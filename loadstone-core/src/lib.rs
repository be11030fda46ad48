//! Loadstone Core - Keys, records, and limits for the load-verification engine.
//!
//! This crate provides the vocabulary shared by every other loadstone crate:
//! the signed 64-bit [`Key`] space, the half-open [`KeyRange`] a run covers,
//! the [`Record`] shape written to and read back from the store, and the
//! explicit [`Limits`] every engine validates its configuration against.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: Prevent mixing up `WorkerId` with `ColumnIndex`
//! - **Explicit limits**: Every resource has a bounded maximum
//! - **Explicit types**: Use u32/u64, not usize
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod record;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use record::Record;
pub use types::{ColumnIndex, Key, KeyRange, WorkerId};
