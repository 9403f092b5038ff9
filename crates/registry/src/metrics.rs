//! Evaluation artifacts: `artifacts/metrics/<capability>/<model_id>.json`.

use std::path::PathBuf;

use serde_json::{Map, Value};

use workbench_core::{store, time};

use crate::entry_path;
use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Clone)]
pub struct MetricsStore {
    dir: PathBuf,
}

impl MetricsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, capability: &str, model_id: &str) -> Option<PathBuf> {
        entry_path(&self.dir.join(capability), model_id)
            .filter(|_| entry_path(&self.dir, capability).is_some())
    }

    pub fn exists(&self, capability: &str, model_id: &str) -> bool {
        self.path(capability, model_id).is_some_and(|p| p.is_file())
    }

    /// Persist a metrics document, stamping `timestamp` and `model_id` if absent.
    pub fn record(
        &self,
        capability: &str,
        model_id: &str,
        mut doc: Map<String, Value>,
    ) -> RegistryResult<Map<String, Value>> {
        let path = self.path(capability, model_id).ok_or_else(|| {
            RegistryError::validation(format!("invalid metrics key: {capability}/{model_id}"))
        })?;
        doc.entry("timestamp").or_insert_with(|| Value::String(time::now_iso()));
        doc.entry("model_id").or_insert_with(|| Value::String(model_id.to_string()));
        store::save_json(&path, &doc)?;
        tracing::info!(%capability, %model_id, "metrics recorded");
        Ok(doc)
    }

    pub fn get(&self, capability: &str, model_id: &str) -> RegistryResult<Option<Value>> {
        let Some(path) = self.path(capability, model_id) else {
            return Ok(None);
        };
        Ok(store::load_json_opt(&path)?)
    }

    /// Every readable artifact for a capability.
    pub fn list(&self, capability: &str) -> Vec<Value> {
        if entry_path(&self.dir, capability).is_none() {
            return Vec::new();
        }
        store::list_json(&self.dir.join(capability))
    }

    /// Newest artifact for a capability, optionally restricted to one model.
    pub fn latest(&self, capability: &str, model_id: Option<&str>) -> Option<Value> {
        let mut items: Vec<Value> = self
            .list(capability)
            .into_iter()
            .filter(|doc| model_id.is_none_or(|id| doc.get("model_id").and_then(Value::as_str) == Some(id)))
            .collect();
        items.sort_by(|a, b| timestamp(b).cmp(timestamp(a)));
        items.into_iter().next()
    }

    /// Look an artifact up by file name (`<model>.json`) across every capability.
    pub fn by_filename(&self, file_name: &str) -> Option<Value> {
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return None;
        }
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return None;
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs.into_iter()
            .map(|d| d.join(file_name))
            .filter(|p| p.is_file())
            .find_map(|p| store::load_json(&p).ok())
    }
}

fn timestamp(doc: &Value) -> &str {
    doc.get("timestamp").and_then(Value::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn record_stamps_missing_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let metrics = MetricsStore::new(tmp.path());
        let saved = metrics.record("chat", "m1", doc(json!({"p50_ms": 1.5}))).unwrap();
        assert_eq!(saved["model_id"], "m1");
        assert!(saved["timestamp"].is_string());
        assert!(metrics.exists("chat", "m1"));
        assert!(!metrics.exists("predictor", "m1"));
    }

    #[test]
    fn latest_prefers_newest_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let metrics = MetricsStore::new(tmp.path());
        metrics.record("predictor", "a", doc(json!({"timestamp": "2024-01-01T00:00:00Z"}))).unwrap();
        metrics.record("predictor", "b", doc(json!({"timestamp": "2025-01-01T00:00:00Z"}))).unwrap();

        assert_eq!(metrics.latest("predictor", None).unwrap()["model_id"], "b");
        assert_eq!(metrics.latest("predictor", Some("a")).unwrap()["model_id"], "a");
        assert!(metrics.latest("predictor", Some("zzz")).is_none());
        assert!(metrics.latest("chat", None).is_none());
    }

    #[test]
    fn by_filename_searches_capabilities_and_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let metrics = MetricsStore::new(tmp.path());
        metrics.record("chat", "m9", Map::new()).unwrap();
        assert_eq!(metrics.by_filename("m9.json").unwrap()["model_id"], "m9");
        assert!(metrics.by_filename("../m9.json").is_none());
        assert!(metrics.by_filename("nothing.json").is_none());
    }
}
