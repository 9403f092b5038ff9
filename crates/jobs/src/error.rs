use thiserror::Error;

use workbench_core::StoreError;
use workbench_registry::RegistryError;
use workbench_runtime::RuntimeError;

pub type JobResult<T> = Result<T, JobError>;

/// Failure of a job body. Captured into the job record, never propagated.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("unknown module_id: {0}")]
    UnknownModule(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
