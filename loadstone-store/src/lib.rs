//! Loadstone Store - Client trait and simulated backend.
//!
//! The engines drive any store through [`StoreClient`]. The in-process
//! [`SimulatedStore`] backs tests and the bundled binary, with
//! deterministic fault injection for exercising failure paths.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod error;
mod simulated;

pub use client::StoreClient;
pub use error::{StoreError, StoreResult};
pub use simulated::{SimulatedStore, SimulatedTable, StoreFaultConfig};
