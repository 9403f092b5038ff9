//! JSON-file registry of the workbench.
//!
//! Every collection lives under the workspace root (see
//! [`WorkbenchLayout`]); listing is lossy, single-entry reads are strict.

pub mod catalog;
pub mod datasets;
pub mod error;
pub mod guardrails;
pub mod metrics;
pub mod models;
pub mod neural_nets;
pub mod workspace;

use std::path::{Path, PathBuf};

use workbench_core::WorkbenchLayout;

pub use catalog::{ModuleCatalog, ModuleManifest, ModuleRecord};
pub use datasets::{DatasetEntry, DatasetFile, DatasetProblem, DatasetRegistry, IngestRequest, ProblemKind};
pub use error::{RegistryError, RegistryResult};
pub use guardrails::{GuardrailPolicy, GuardrailStore};
pub use metrics::MetricsStore;
pub use models::{ModelEntry, ModelRegistry};
pub use neural_nets::{NeuralNetRegistry, NeuralNetSpec};
pub use workspace::{Mappings, Workspace, WorkspaceStore};

/// `<dir>/<id>.json`, or `None` for ids that would escape `dir`.
pub(crate) fn entry_path(dir: &Path, id: &str) -> Option<PathBuf> {
    workbench_core::id::is_file_safe(id).then(|| dir.join(format!("{id}.json")))
}

/// All registry collections rooted at one layout.
#[derive(Debug, Clone)]
pub struct Registry {
    layout: WorkbenchLayout,
    catalog: ModuleCatalog,
    models: ModelRegistry,
    neural_nets: NeuralNetRegistry,
    datasets: DatasetRegistry,
    workspace: WorkspaceStore,
    metrics: MetricsStore,
    guardrails: GuardrailStore,
}

impl Registry {
    pub fn new(layout: WorkbenchLayout) -> Self {
        Self {
            catalog: ModuleCatalog::new(layout.modules_dir()),
            models: ModelRegistry::new(layout.models_dir()),
            neural_nets: NeuralNetRegistry::new(layout.neural_nets_dir()),
            datasets: DatasetRegistry::new(layout.clone()),
            workspace: WorkspaceStore::new(layout.pending_workspace_path(), layout.mappings_path()),
            metrics: MetricsStore::new(layout.metrics_dir()),
            guardrails: GuardrailStore::new(layout.guardrails_path()),
            layout,
        }
    }

    pub fn layout(&self) -> &WorkbenchLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn neural_nets(&self) -> &NeuralNetRegistry {
        &self.neural_nets
    }

    pub fn datasets(&self) -> &DatasetRegistry {
        &self.datasets
    }

    pub fn workspace(&self) -> &WorkspaceStore {
        &self.workspace
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    pub fn guardrails(&self) -> &GuardrailStore {
        &self.guardrails
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_paths_stay_inside_their_directory() {
        let dir = Path::new("/r");
        assert_eq!(entry_path(dir, "m1"), Some(PathBuf::from("/r/m1.json")));
        assert!(entry_path(dir, "").is_none());
        assert!(entry_path(dir, "..").is_none());
        assert!(entry_path(dir, "a/b").is_none());
        assert!(entry_path(dir, ".hidden").is_none());
    }
}
