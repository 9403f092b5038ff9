//! Persistence error model.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type used by the blob store helpers.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure while reading or writing a persisted document.
///
/// Keep this focused on the filesystem and JSON codec; callers decide whether a
/// missing or unreadable document is fatal (readiness) or skippable (listing).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The document exists but is not valid JSON for the requested shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The value could not be encoded as JSON.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Any other filesystem failure.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
