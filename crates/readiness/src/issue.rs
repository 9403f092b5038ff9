use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use workbench_core::WorkbenchLayout;

/// Machine-readable reason a workspace is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessCode {
    ManifestInvalid,
    WorkspaceReadFailed,
    MappingIncomplete,
    MappingReadFailed,
    RegistryMissing,
    RegistryUnreadable,
    DatasetMissing,
    DatasetChecksumMismatch,
    ArtifactMissing,
    ModelNotRunnable,
    WordnetRootMissing,
    WordnetIndexMissing,
    WordnetSynthMissing,
    PredictorDatasetMissing,
    GuardrailsInvalid,
    GuardrailsReadFailed,
    FilesystemReadonly,
}

impl ReadinessCode {
    pub const ALL: [ReadinessCode; 17] = [
        Self::ManifestInvalid,
        Self::WorkspaceReadFailed,
        Self::MappingIncomplete,
        Self::MappingReadFailed,
        Self::RegistryMissing,
        Self::RegistryUnreadable,
        Self::DatasetMissing,
        Self::DatasetChecksumMismatch,
        Self::ArtifactMissing,
        Self::ModelNotRunnable,
        Self::WordnetRootMissing,
        Self::WordnetIndexMissing,
        Self::WordnetSynthMissing,
        Self::PredictorDatasetMissing,
        Self::GuardrailsInvalid,
        Self::GuardrailsReadFailed,
        Self::FilesystemReadonly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManifestInvalid => "manifest_invalid",
            Self::WorkspaceReadFailed => "workspace_read_failed",
            Self::MappingIncomplete => "mapping_incomplete",
            Self::MappingReadFailed => "mapping_read_failed",
            Self::RegistryMissing => "registry_missing",
            Self::RegistryUnreadable => "registry_unreadable",
            Self::DatasetMissing => "dataset_missing",
            Self::DatasetChecksumMismatch => "dataset_checksum_mismatch",
            Self::ArtifactMissing => "artifact_missing",
            Self::ModelNotRunnable => "model_not_runnable",
            Self::WordnetRootMissing => "wordnet_root_missing",
            Self::WordnetIndexMissing => "wordnet_index_missing",
            Self::WordnetSynthMissing => "wordnet_synth_missing",
            Self::PredictorDatasetMissing => "predictor_dataset_missing",
            Self::GuardrailsInvalid => "guardrails_invalid",
            Self::GuardrailsReadFailed => "guardrails_read_failed",
            Self::FilesystemReadonly => "filesystem_readonly",
        }
    }

    /// Log file under `artifacts/logs/` that covers this kind of problem.
    pub fn log_topic(self) -> &'static str {
        match self {
            Self::ManifestInvalid => "modules.txt",
            Self::WorkspaceReadFailed | Self::MappingIncomplete | Self::MappingReadFailed => "workspace.txt",
            Self::RegistryMissing | Self::RegistryUnreadable => "registry.txt",
            Self::DatasetMissing | Self::DatasetChecksumMismatch | Self::PredictorDatasetMissing => "datasets.txt",
            Self::ArtifactMissing => "artifacts.txt",
            Self::ModelNotRunnable => "runtime.txt",
            Self::WordnetRootMissing | Self::WordnetIndexMissing | Self::WordnetSynthMissing => "wordnet.txt",
            Self::GuardrailsInvalid | Self::GuardrailsReadFailed => "guardrails.txt",
            Self::FilesystemReadonly => "fs.txt",
        }
    }
}

impl fmt::Display for ReadinessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One blocking problem. The four named fields are always present; the
/// rest (`module_id`, `model_id`, `expected`, ...) depends on the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessIssue {
    pub error_code: ReadinessCode,
    pub human_message: String,
    pub hint: String,
    pub where_to_find_logs: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReadinessIssue {
    pub fn new(
        layout: &WorkbenchLayout,
        code: ReadinessCode,
        human_message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            error_code: code,
            human_message: human_message.into(),
            hint: hint.into(),
            where_to_find_logs: layout.log_path(code.log_topic()).to_string_lossy().into_owned(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_serializes_flat() {
        let layout = WorkbenchLayout::new("/srv/wb");
        let issue = ReadinessIssue::new(&layout, ReadinessCode::ArtifactMissing, "Missing artifact", "Run evaluation")
            .with("model_id", "m1");
        let doc = serde_json::to_value(&issue).unwrap();
        assert_eq!(doc["error_code"], "artifact_missing");
        assert_eq!(doc["where_to_find_logs"], "/srv/wb/artifacts/logs/artifacts.txt");
        assert_eq!(doc["model_id"], "m1");
        assert_eq!(serde_json::to_value(ReadinessCode::FilesystemReadonly).unwrap(), "filesystem_readonly");
    }

    proptest::proptest! {
        #[test]
        fn display_matches_wire_name(idx in 0usize..ReadinessCode::ALL.len(), value in "[a-z0-9_]{0,12}") {
            let code = ReadinessCode::ALL[idx];
            let layout = WorkbenchLayout::new("/srv/wb");
            let issue = ReadinessIssue::new(&layout, code, "m", "h").with("module_id", value.clone());
            let doc = serde_json::to_value(&issue).unwrap();
            proptest::prop_assert_eq!(doc["error_code"].as_str(), Some(code.as_str()));
            proptest::prop_assert_eq!(code.to_string(), code.as_str());
            proptest::prop_assert_eq!(doc["module_id"].as_str(), Some(value.as_str()));
            let back: ReadinessIssue = serde_json::from_value(doc).unwrap();
            proptest::prop_assert_eq!(back, issue);
        }
    }
}
