//! The pending workspace selection and its model mappings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use workbench_core::rng::DEFAULT_SEED;
use workbench_core::{store, time};

use crate::error::RegistryResult;

pub const PENDING_WORKSPACE_ID: &str = "pending";
pub const DEFAULT_WORKSPACE_NAME: &str = "Pending Workspace";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default = "pending_id")]
    pub id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub selected_modules: Vec<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            id: pending_id(),
            name: default_name(),
            selected_modules: Vec::new(),
            seed: DEFAULT_SEED,
            updated_at: None,
        }
    }
}

fn pending_id() -> String {
    PENDING_WORKSPACE_ID.to_string()
}

fn default_name() -> String {
    DEFAULT_WORKSPACE_NAME.to_string()
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Module and capability assignments to model ids. Both maps are always written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mappings {
    #[serde(default)]
    pub module_map: BTreeMap<String, String>,
    #[serde(default)]
    pub capability_map: BTreeMap<String, String>,
}

impl Mappings {
    /// Every model id referenced by either map, deduplicated and sorted.
    pub fn mapped_models(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .module_map
            .values()
            .chain(self.capability_map.values())
            .map(String::as_str)
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    workspace_path: PathBuf,
    mappings_path: PathBuf,
}

impl WorkspaceStore {
    pub fn new(workspace_path: impl Into<PathBuf>, mappings_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            mappings_path: mappings_path.into(),
        }
    }

    /// The saved workspace, or the default one when nothing has been saved.
    pub fn get(&self) -> RegistryResult<Workspace> {
        Ok(store::load_json_opt(&self.workspace_path)?.unwrap_or_default())
    }

    /// Replace the workspace wholesale.
    pub fn save(
        &self,
        name: Option<String>,
        selected_modules: Vec<String>,
        seed: Option<u64>,
    ) -> RegistryResult<Workspace> {
        let ws = Workspace {
            id: pending_id(),
            name: name.filter(|n| !n.is_empty()).unwrap_or_else(default_name),
            selected_modules,
            seed: seed.unwrap_or(DEFAULT_SEED),
            updated_at: Some(time::now_iso()),
        };
        store::save_json(&self.workspace_path, &ws)?;
        tracing::info!(modules = ?ws.selected_modules, seed = ws.seed, "workspace saved");
        Ok(ws)
    }

    /// The raw mappings record: `Ok(None)` when never saved.
    pub fn mappings(&self) -> RegistryResult<Option<Mappings>> {
        Ok(store::load_json_opt(&self.mappings_path)?)
    }

    pub fn mappings_or_default(&self) -> RegistryResult<Mappings> {
        Ok(self.mappings()?.unwrap_or_default())
    }

    pub fn save_mappings(&self, mappings: Mappings) -> RegistryResult<Mappings> {
        store::save_json(&self.mappings_path, &mappings)?;
        tracing::info!(
            modules = mappings.module_map.len(),
            capabilities = mappings.capability_map.len(),
            "mappings saved"
        );
        Ok(mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &std::path::Path) -> WorkspaceStore {
        WorkspaceStore::new(dir.join("pending.json"), dir.join("mappings.json"))
    }

    #[test]
    fn defaults_when_nothing_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = store_in(tmp.path()).get().unwrap();
        assert_eq!(ws.id, "pending");
        assert_eq!(ws.name, "Pending Workspace");
        assert_eq!(ws.seed, 1337);
        assert!(ws.selected_modules.is_empty());
        assert!(store_in(tmp.path()).mappings().unwrap().is_none());
    }

    #[test]
    fn save_replaces_the_whole_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.save(Some("Mine".into()), vec!["chat-core".into()], Some(7)).unwrap();
        let ws = store.save(None, vec![], None).unwrap();
        assert_eq!(ws.name, "Pending Workspace");
        assert_eq!(ws.seed, 1337);
        assert_eq!(store.get().unwrap(), ws);
    }

    #[test]
    fn saved_mappings_always_carry_both_maps() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let mut m = Mappings::default();
        m.module_map.insert("chat-core".into(), "m1".into());
        store.save_mappings(m).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("mappings.json")).unwrap())
                .unwrap();
        assert!(raw["capability_map"].as_object().unwrap().is_empty());
        assert_eq!(raw["module_map"]["chat-core"], "m1");
    }

    #[test]
    fn corrupt_workspace_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("pending.json"), "[").unwrap();
        assert!(store_in(tmp.path()).get().is_err());
    }

    #[test]
    fn mapped_models_are_unique() {
        let mut m = Mappings::default();
        m.module_map.insert("a".into(), "m1".into());
        m.capability_map.insert("chat".into(), "m1".into());
        m.capability_map.insert("predictor".into(), "m2".into());
        assert_eq!(m.mapped_models(), vec!["m1", "m2"]);
    }
}
