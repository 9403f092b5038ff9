//! Neural-network architecture specs: `registry/neural_nets/<id>.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use workbench_core::{id, store, time};

use crate::entry_path;
use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shapes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shape of `neural_networks.yaml`: either `{architectures: [...]}` or a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { architectures: Vec<CatalogEntry> },
    Bare(Vec<CatalogEntry>),
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    family: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NeuralNetRegistry {
    dir: PathBuf,
}

impl NeuralNetRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn list(&self) -> Vec<NeuralNetSpec> {
        store::list_json(&self.dir)
    }

    pub fn exists(&self, id: &str) -> bool {
        entry_path(&self.dir, id).is_some_and(|p| p.is_file())
    }

    pub fn get(&self, id: &str) -> RegistryResult<Option<NeuralNetSpec>> {
        let Some(path) = entry_path(&self.dir, id) else {
            return Ok(None);
        };
        Ok(store::load_json_opt(&path)?)
    }

    /// Family of a registered spec; `None` when absent or unreadable.
    pub fn family_of(&self, id: &str) -> Option<String> {
        self.get(id).ok().flatten().and_then(|s| s.family)
    }

    pub fn create(&self, mut spec: NeuralNetSpec) -> RegistryResult<NeuralNetSpec> {
        if spec.id.is_empty() {
            spec.id = id::generated_id("nn");
        }
        if spec.name.is_empty() {
            spec.name = spec.id.clone();
        }
        if spec.created_at.is_none() {
            spec.created_at = Some(time::now_iso());
        }
        let path = entry_path(&self.dir, &spec.id)
            .ok_or_else(|| RegistryError::validation(format!("invalid neural net id: {:?}", spec.id)))?;
        store::save_json(&path, &spec)?;
        tracing::info!(nn_id = %spec.id, family = ?spec.family, "neural net registered");
        Ok(spec)
    }

    /// Register every catalog architecture that is not already present.
    ///
    /// Returns how many specs were added. A missing catalog adds nothing.
    pub fn seed_from_catalog(&self, catalog: &Path) -> RegistryResult<usize> {
        let raw = match std::fs::read_to_string(catalog) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let parsed: CatalogFile =
            serde_yaml::from_str(&raw).map_err(|e| RegistryError::Catalog(e.to_string()))?;
        let entries = match parsed {
            CatalogFile::Wrapped { architectures } => architectures,
            CatalogFile::Bare(list) => list,
        };

        let mut added = 0;
        for entry in entries {
            if entry.id.is_empty() || self.exists(&entry.id) {
                continue;
            }
            self.create(NeuralNetSpec {
                name: entry.name.unwrap_or_else(|| entry.id.clone()),
                id: entry.id,
                family: entry.family,
                ..NeuralNetSpec::default()
            })?;
            added += 1;
        }
        Ok(added)
    }
}
