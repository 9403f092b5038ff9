//! `workbench-core`: shared building blocks.
//!
//! Paths, the JSON blob store, identifiers, clocks, seeded randomness and CSV
//! line splitting. No registry or job semantics live here.

pub mod config;
pub mod csv;
pub mod error;
pub mod id;
pub mod layout;
pub mod rng;
pub mod store;
pub mod time;

pub use config::WorkbenchConfig;
pub use error::{StoreError, StoreResult};
pub use id::JobId;
pub use layout::WorkbenchLayout;
