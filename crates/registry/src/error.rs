use thiserror::Error;

use workbench_core::StoreError;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry-level failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied data was rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Dataset ingestion was asked for a format it does not understand.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The static neural-net catalog could not be parsed.
    #[error("invalid neural-net catalog: {0}")]
    Catalog(String),
}

impl RegistryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
