//! Identifier helpers.
//!
//! Registry entities use human-readable string ids (often chosen by callers);
//! generated ids are `<prefix>_<random hex>`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random lowercase hex string of `len` characters (max 32).
pub fn random_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len.min(32));
    hex
}

/// Generated entity id such as `model_1a2b3c4d`.
pub fn generated_id(prefix: &str) -> String {
    format!("{prefix}_{}", random_hex(8))
}

/// Whether `id` can name a file directly inside a store directory.
///
/// Rejects empty ids, dot-files, path separators and control characters.
pub fn is_file_safe(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\']) && !id.chars().any(char::is_control)
}

/// Identifier of one scheduler execution: `"{job_type}_{hex10}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a fresh id for a job of the given type.
    pub fn generate(job_type: &str) -> Self {
        Self(format!("{job_type}_{}", random_hex(10)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_file_safe(&self) -> bool {
        is_file_safe(&self.0)
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_carry_type_prefix_and_ten_hex_chars() {
        let id = JobId::generate("train");
        let suffix = id.as_str().strip_prefix("train_").unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generated_id("model"), generated_id("model"));
    }

    #[test]
    fn file_safe_ids_cannot_leave_their_directory() {
        assert!(is_file_safe("train_0a1b2c3d4e"));
        for bad in ["", ".hidden", "../../x", "a/b", "a\\b", "a\nb"] {
            assert!(!is_file_safe(bad), "{bad:?}");
        }
        assert!(!JobId::generate("../../pwned").is_file_safe());
    }
}
