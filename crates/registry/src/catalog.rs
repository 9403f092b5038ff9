//! Capability-module discovery.
//!
//! Each module lives in `modules/<dir>/manifest.json`. Discovery never fails:
//! a manifest that cannot be read, parsed, or validated becomes an
//! [`ModuleRecord::Invalid`] carrying the directory name and the reason.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields every manifest must declare.
pub const REQUIRED_FIELDS: [&str; 15] = [
    "id",
    "name",
    "version",
    "description",
    "capabilities",
    "task",
    "inputs",
    "outputs",
    "ui_panels",
    "model_constraints",
    "pipelines",
    "resources",
    "guardrails",
    "autotrain",
    "schema_version",
];

/// A validated module manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub id: String,
    // Only presence is required of these; any JSON type is kept as-is.
    pub name: Value,
    pub version: Value,
    pub description: Value,
    pub capabilities: Vec<String>,
    pub task: Value,
    pub inputs: Value,
    pub outputs: Value,
    pub ui_panels: Value,
    pub model_constraints: Value,
    pub pipelines: Value,
    pub resources: Value,
    pub guardrails: Value,
    pub autotrain: Value,
    pub schema_version: Value,
    /// Where the manifest was read from.
    #[serde(rename = "_manifest_path", default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    /// Anything else the manifest declares (permissions, docs links, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleManifest {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Outcome of discovering one module directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleRecord {
    Valid(Box<ModuleManifest>),
    Invalid { id: String, error: String },
}

impl ModuleRecord {
    pub fn id(&self) -> &str {
        match self {
            ModuleRecord::Valid(m) => &m.id,
            ModuleRecord::Invalid { id, .. } => id,
        }
    }

    pub fn manifest(&self) -> Option<&ModuleManifest> {
        match self {
            ModuleRecord::Valid(m) => Some(m),
            ModuleRecord::Invalid { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ModuleRecord::Valid(_) => None,
            ModuleRecord::Invalid { error, .. } => Some(error),
        }
    }
}

/// Read-only view over the modules directory.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules_dir: PathBuf,
}

impl ModuleCatalog {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    /// Scan the modules directory, one record per `*/manifest.json`, ordered by directory name.
    pub fn discover(&self) -> Vec<ModuleRecord> {
        let Ok(entries) = std::fs::read_dir(&self.modules_dir) else {
            return Vec::new();
        };

        let mut manifests: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .map(|dir| dir.join("manifest.json"))
            .filter(|p| p.is_file())
            .collect();
        manifests.sort();

        manifests.iter().map(|p| load_record(p)).collect()
    }

    /// The record whose id matches, valid or not.
    pub fn find(&self, id: &str) -> Option<ModuleRecord> {
        self.discover().into_iter().find(|r| r.id() == id)
    }
}

fn load_record(manifest_path: &Path) -> ModuleRecord {
    match parse_manifest(manifest_path) {
        Ok(manifest) => ModuleRecord::Valid(Box::new(manifest)),
        Err(error) => {
            let id = manifest_path
                .parent()
                .and_then(|d| d.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::warn!(module = %id, %error, "invalid module manifest");
            ModuleRecord::Invalid { id, error }
        }
    }
}

fn parse_manifest(path: &Path) -> Result<ModuleManifest, String> {
    let raw: Value = workbench_core::store::load_json(path).map_err(|e| e.to_string())?;
    let Value::Object(obj) = &raw else {
        return Err("manifest is not a JSON object".to_string());
    };

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|k| !obj.contains_key(**k)) {
        return Err(format!("manifest missing field: {missing}"));
    }

    let mut manifest: ModuleManifest =
        serde_json::from_value(raw).map_err(|e| format!("invalid manifest: {e}"))?;
    manifest.manifest_path = Some(path.to_string_lossy().into_owned());
    Ok(manifest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn manifest_json(id: &str, capabilities: &[&str]) -> Value {
        json!({
            "id": id,
            "name": id,
            "version": "0.1.0",
            "description": "test module",
            "capabilities": capabilities,
            "task": "test",
            "inputs": [],
            "outputs": [],
            "ui_panels": [],
            "model_constraints": {},
            "pipelines": [],
            "resources": {},
            "guardrails": {},
            "autotrain": false,
            "schema_version": "1"
        })
    }

    fn write_manifest(root: &Path, dir: &str, doc: &Value) {
        workbench_core::store::save_json(&root.join(dir).join("manifest.json"), doc).unwrap();
    }

    #[test]
    fn valid_manifests_are_annotated_with_their_path() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), "chat-core", &manifest_json("chat-core", &["chat"]));

        let records = ModuleCatalog::new(tmp.path()).discover();
        assert_eq!(records.len(), 1);
        let m = records[0].manifest().unwrap();
        assert!(m.has_capability("chat"));
        assert!(m.manifest_path.as_deref().unwrap().ends_with("manifest.json"));
    }

    #[test]
    fn every_missing_required_field_yields_an_error_record() {
        for field in REQUIRED_FIELDS {
            let tmp = tempfile::tempdir().unwrap();
            let mut doc = manifest_json("broken", &["chat"]);
            doc.as_object_mut().unwrap().remove(field);
            write_manifest(tmp.path(), "broken-dir", &doc);

            let records = ModuleCatalog::new(tmp.path()).discover();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].id(), "broken-dir");
            assert_eq!(
                records[0].error().unwrap(),
                format!("manifest missing field: {field}")
            );
        }
    }

    #[test]
    fn unparseable_manifest_does_not_stop_discovery() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("aaa")).unwrap();
        std::fs::write(tmp.path().join("aaa/manifest.json"), "{oops").unwrap();
        write_manifest(tmp.path(), "bbb", &manifest_json("bbb", &["predictor"]));

        let records = ModuleCatalog::new(tmp.path()).discover();
        assert_eq!(records.len(), 2);
        assert!(records[0].error().is_some());
        assert!(records[1].manifest().is_some());
    }

    #[test]
    fn descriptive_fields_accept_any_json_type() {
        let tmp = tempfile::tempdir().unwrap();
        let mut doc = manifest_json("loose", &["chat"]);
        doc["version"] = json!(2);
        doc["name"] = json!({"en": "Loose"});
        doc["description"] = Value::Null;
        write_manifest(tmp.path(), "loose", &doc);

        let record = ModuleCatalog::new(tmp.path()).find("loose").unwrap();
        let m = record.manifest().unwrap_or_else(|| panic!("{:?}", record.error()));
        assert_eq!(m.version, json!(2));
        assert_eq!(m.name["en"], "Loose");
        assert!(m.description.is_null());
    }

    #[test]
    fn missing_modules_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ModuleCatalog::new(tmp.path().join("nope")).discover().is_empty());
    }

    #[test]
    fn extra_fields_are_preserved() {
        let tmp = tempfile::tempdir().unwrap();
        let mut doc = manifest_json("x", &["chat"]);
        doc["permissions"] = json!({"files": true});
        write_manifest(tmp.path(), "x", &doc);

        let m = ModuleCatalog::new(tmp.path()).find("x").unwrap();
        assert_eq!(m.manifest().unwrap().extra["permissions"]["files"], true);
    }
}
