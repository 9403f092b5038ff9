//! On-disk layout of a workbench root.
//!
//! All persisted state lives under one root directory:
//!
//! ```text
//! <root>/
//! ├── modules/<module_id>/manifest.json
//! ├── registry/{models,neural_nets,datasets,workspaces,guardrails}/
//! ├── artifacts/{metrics,jobs,indices,datasets,chat,logs,traces}/
//! ├── WordNet-3.0/dict/
//! └── neural_networks.yaml
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// File name of the prebuilt lexicon index under `artifacts/indices`.
pub const LEXICON_INDEX_FILE: &str = "wordnet-lexicon.jsonl";

/// Module id of the financial predictor, which ships a sample dataset.
pub const PREDICTOR_MODULE_ID: &str = "predictor-finance";

/// Path resolver for one workbench root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbenchLayout {
    root: PathBuf,
}

impl WorkbenchLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    pub fn predictor_sample_path(&self) -> PathBuf {
        self.modules_dir()
            .join(PREDICTOR_MODULE_ID)
            .join("data")
            .join("samples")
            .join("ohlcv.csv")
    }

    pub fn predictor_checkpoint_dir(&self) -> PathBuf {
        self.modules_dir().join(PREDICTOR_MODULE_ID).join("models")
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.root.join("registry")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.registry_dir().join("models")
    }

    pub fn neural_nets_dir(&self) -> PathBuf {
        self.registry_dir().join("neural_nets")
    }

    pub fn dataset_entries_dir(&self) -> PathBuf {
        self.registry_dir().join("datasets")
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.registry_dir().join("workspaces")
    }

    pub fn pending_workspace_path(&self) -> PathBuf {
        self.workspaces_dir().join("pending.json")
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.workspaces_dir().join("mappings.json")
    }

    pub fn guardrails_dir(&self) -> PathBuf {
        self.registry_dir().join("guardrails")
    }

    pub fn guardrails_path(&self) -> PathBuf {
        self.guardrails_dir().join("config.json")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.artifacts_dir().join("metrics")
    }

    pub fn metrics_path(&self, capability: &str, model_id: &str) -> PathBuf {
        self.metrics_dir().join(capability).join(format!("{model_id}.json"))
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.artifacts_dir().join("jobs")
    }

    pub fn indices_dir(&self) -> PathBuf {
        self.artifacts_dir().join("indices")
    }

    pub fn lexicon_index_path(&self) -> PathBuf {
        self.indices_dir().join(LEXICON_INDEX_FILE)
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.artifacts_dir().join("datasets")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.datasets_dir().join("uploads")
    }

    pub fn synth_dialogs_path(&self, seed: u64) -> PathBuf {
        self.datasets_dir().join(format!("wordnet_synth_{seed}.jsonl"))
    }

    pub fn chat_dir(&self) -> PathBuf {
        self.artifacts_dir().join("chat")
    }

    pub fn ngram_path(&self) -> PathBuf {
        self.chat_dir().join("lm_ngram.json")
    }

    pub fn counts_path(&self) -> PathBuf {
        self.chat_dir().join("lm_counts.json")
    }

    pub fn bubble_dir(&self) -> PathBuf {
        self.artifacts_dir().join("bubble")
    }

    pub fn babble_model_path(&self) -> PathBuf {
        self.bubble_dir().join("model.json")
    }

    /// Run directory of a training job, e.g. `artifacts/rl/ppo_7`.
    pub fn run_dir(&self, area: &str, name: &str, seed: u64) -> PathBuf {
        self.artifacts_dir().join(area).join(format!("{name}_{seed}"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.artifacts_dir().join("logs")
    }

    pub fn log_path(&self, topic: &str) -> PathBuf {
        self.logs_dir().join(topic)
    }

    pub fn traces_dir(&self) -> PathBuf {
        self.artifacts_dir().join("traces")
    }

    pub fn wordnet_root(&self) -> PathBuf {
        self.root.join("WordNet-3.0")
    }

    pub fn wordnet_dict_dir(&self) -> PathBuf {
        self.wordnet_root().join("dict")
    }

    pub fn nn_catalog_path(&self) -> PathBuf {
        self.root.join("neural_networks.yaml")
    }

    /// Resolve a stored path: absolute paths pass through, relative ones hang off the root.
    pub fn resolve(&self, stored: &str) -> PathBuf {
        let p = Path::new(stored);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Inverse of [`resolve`](Self::resolve): root-relative when possible, else as given.
    pub fn relativize(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Create every directory the workbench writes into.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            self.models_dir(),
            self.neural_nets_dir(),
            self.dataset_entries_dir(),
            self.workspaces_dir(),
            self.guardrails_dir(),
            self.metrics_dir(),
            self.jobs_dir(),
            self.indices_dir(),
            self.datasets_dir(),
            self.chat_dir(),
            self.logs_dir(),
            self.traces_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
