//! Job scheduling for the workbench.
//!
//! A [`JobScheduler`] dispatches named jobs (`train`, `evaluate`, the
//! `train_*` variants and anything registered later) to handler functions,
//! persisting one [`JobRecord`] per run through a [`JobStore`].

pub mod auto_eval;
pub mod bodies;
pub mod bootstrap;
pub mod error;
pub mod scheduler;
pub mod store;
pub mod types;

pub use bootstrap::BootstrapReport;
pub use error::{JobError, JobResult};
pub use scheduler::{JobContext, JobEnv, JobHandler, JobOutput, JobScheduler};
pub use store::{FsJobStore, InMemoryJobStore, JobStore, JobStoreError};
pub use types::{JobRecord, JobStatus};
