//! Trained-model registry: `registry/models/<id>.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use workbench_core::{id, store, time};

use crate::error::{RegistryError, RegistryResult};
use crate::entry_path;

/// A registered model artifact.
///
/// Body-specific fields (`checkpoint`, `window`, `lm_path`, `order`, ...) live in
/// `extra` and survive a read/write cycle untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dataset_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_adapter: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// `dataset_ids` followed by `dataset_id`, without repeats.
    pub fn referenced_datasets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self.dataset_ids.iter().chain(self.dataset_id.iter()) {
            if !id.is_empty() && !out.contains(&id.as_str()) {
                out.push(id);
            }
        }
        out
    }

    /// Retrieval-mode models carry no runnable weights.
    pub fn is_retrieval(&self) -> bool {
        self.mode.as_deref().is_some_and(|m| m.starts_with("retrieval"))
    }

    pub fn has_inference_adapter(&self) -> bool {
        match &self.inference_adapter {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Number(_)) | Some(Value::Bool(true)) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    dir: PathBuf,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every readable entry; corrupt files are skipped.
    pub fn list(&self) -> Vec<ModelEntry> {
        store::list_json(&self.dir)
    }

    pub fn exists(&self, id: &str) -> bool {
        entry_path(&self.dir, id).is_some_and(|p| p.is_file())
    }

    /// `Ok(None)` when absent, `Err` when present but unreadable.
    pub fn get(&self, id: &str) -> RegistryResult<Option<ModelEntry>> {
        let Some(path) = entry_path(&self.dir, id) else {
            return Ok(None);
        };
        Ok(store::load_json_opt(&path)?)
    }

    /// Write an entry as-is, replacing any previous version.
    pub fn save(&self, entry: &ModelEntry) -> RegistryResult<()> {
        let path = entry_path(&self.dir, &entry.id)
            .ok_or_else(|| RegistryError::validation(format!("invalid model id: {:?}", entry.id)))?;
        store::save_json(&path, entry)?;
        tracing::info!(model_id = %entry.id, "model registered");
        Ok(())
    }

    /// Fill in id, name and created_at where missing, then save.
    pub fn create(&self, mut entry: ModelEntry) -> RegistryResult<ModelEntry> {
        if entry.id.is_empty() {
            entry.id = id::generated_id("model");
        }
        if entry.name.is_empty() {
            entry.name = entry.id.clone();
        }
        if entry.created_at.is_none() {
            entry.created_at = Some(time::now_iso());
        }
        self.save(&entry)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_generates_id_and_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::new(tmp.path());

        let created = reg.create(ModelEntry::default()).unwrap();
        assert!(created.id.starts_with("model_"));
        assert_eq!(created.id.len(), "model_".len() + 8);
        assert_eq!(created.name, created.id);
        assert!(created.created_at.is_some());

        assert_eq!(reg.get(&created.id).unwrap(), Some(created));
    }

    #[test]
    fn get_distinguishes_absent_from_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::new(tmp.path());
        assert!(reg.get("nope").unwrap().is_none());

        std::fs::write(tmp.path().join("bad.json"), "not json").unwrap();
        assert!(reg.get("bad").is_err());
        assert!(reg.list().is_empty());
    }

    #[test]
    fn body_specific_fields_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::new(tmp.path());
        let mut entry = ModelEntry::new("predictor_ma_1337", "MA");
        entry.extra.insert("window".into(), json!(5));
        reg.save(&entry).unwrap();

        let back = reg.get("predictor_ma_1337").unwrap().unwrap();
        assert_eq!(back.extra["window"], 5);
        assert!(back.metrics.is_empty());
    }

    #[test]
    fn referenced_datasets_merges_both_fields() {
        let mut entry = ModelEntry::new("m", "m");
        entry.dataset_ids = vec!["a".into(), "b".into()];
        entry.dataset_id = Some("a".into());
        assert_eq!(entry.referenced_datasets(), vec!["a", "b"]);

        entry.dataset_id = Some("c".into());
        assert_eq!(entry.referenced_datasets(), vec!["a", "b", "c"]);
    }

    #[test]
    fn ids_with_separators_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::new(tmp.path());
        assert!(reg.save(&ModelEntry::new("../escape", "x")).is_err());
        assert!(reg.get("../escape").unwrap().is_none());
    }

    #[test]
    fn retrieval_mode_and_adapter_detection() {
        let mut entry = ModelEntry::new("m", "m");
        assert!(!entry.is_retrieval());
        entry.mode = Some("retrieval+ngram".into());
        assert!(entry.is_retrieval());

        assert!(!entry.has_inference_adapter());
        entry.inference_adapter = Some(json!(""));
        assert!(!entry.has_inference_adapter());
        entry.inference_adapter = Some(json!("onnx"));
        assert!(entry.has_inference_adapter());
    }
}
