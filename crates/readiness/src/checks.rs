//! The individual readiness checks. Each appends to the shared issue list
//! and never stops the pass.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Value, json};

use workbench_core::{WorkbenchLayout, layout::PREDICTOR_MODULE_ID, store};
use workbench_registry::guardrails::default_config;
use workbench_registry::{
    Mappings, ModelEntry, ModuleManifest, ModuleRecord, ProblemKind, Registry, Workspace,
};

use crate::issue::{ReadinessCode as Code, ReadinessIssue};

pub(crate) struct Checker<'a> {
    registry: &'a Registry,
    modules: Vec<ModuleRecord>,
    pub(crate) issues: Vec<ReadinessIssue>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            modules: registry.catalog().discover(),
            issues: Vec::new(),
        }
    }

    fn layout(&self) -> &WorkbenchLayout {
        self.registry.layout()
    }

    fn push(&mut self, code: Code, message: impl Into<String>, hint: &str) -> &mut ReadinessIssue {
        let issue = ReadinessIssue::new(self.registry.layout(), code, message, hint);
        self.issues.push(issue);
        let last = self.issues.len() - 1;
        &mut self.issues[last]
    }

    fn manifest(&self, module_id: &str) -> Option<&ModuleManifest> {
        self.modules
            .iter()
            .filter_map(ModuleRecord::manifest)
            .find(|m| m.id == module_id)
    }

    fn capabilities(&self, module_id: &str) -> Vec<String> {
        self.manifest(module_id)
            .map(|m| m.capabilities.clone())
            .unwrap_or_default()
    }

    pub(crate) fn manifests(&mut self) {
        let invalid: Vec<(String, String)> = self
            .modules
            .iter()
            .filter_map(|r| r.error().map(|e| (r.id().to_string(), e.to_string())))
            .collect();
        for (module_id, details) in invalid {
            self.push(
                Code::ManifestInvalid,
                format!("Module manifest {module_id} is invalid."),
                "Check the manifest against the required module fields.",
            )
            .extra
            .extend([("details".into(), json!(details)), ("module_id".into(), json!(module_id))]);
        }

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for m in self.modules.iter().filter_map(ModuleRecord::manifest) {
            *seen.entry(m.id.as_str()).or_default() += 1;
        }
        let duplicates: Vec<String> = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        for module_id in duplicates {
            self.push(
                Code::ManifestInvalid,
                format!("Module id {module_id} is declared by more than one manifest."),
                "Give every module directory a unique manifest id.",
            )
            .extra
            .extend([
                ("details".into(), json!("duplicate module id")),
                ("module_id".into(), json!(module_id)),
            ]);
        }
    }

    pub(crate) fn workspace(&mut self) -> Workspace {
        match self.registry.workspace().get() {
            Ok(ws) => ws,
            Err(e) => {
                self.push(
                    Code::WorkspaceReadFailed,
                    format!("Failed to read pending workspace: {e}"),
                    "Re-save the module selection.",
                );
                Workspace::default()
            }
        }
    }

    pub(crate) fn mappings(&mut self, selected: &[String]) {
        let mappings = match self.registry.workspace().mappings() {
            Ok(Some(m)) => m,
            Ok(None) => {
                if !selected.is_empty() {
                    self.push(
                        Code::MappingIncomplete,
                        "One or more selected modules are not Ready (no model mappings).",
                        "Map exactly one compatible model per selected module.",
                    )
                    .extra
                    .insert("selected_modules".into(), json!(selected));
                }
                return;
            }
            Err(e) => {
                self.push(
                    Code::MappingReadFailed,
                    format!("Failed to read mappings.json: {e}"),
                    "Re-save the model mappings.",
                );
                return;
            }
        };

        if !mappings.module_map.is_empty() {
            for module_id in selected {
                self.module_mapping(&mappings, module_id);
            }
        } else if !mappings.capability_map.is_empty() {
            for module_id in selected {
                self.capability_mapping(&mappings, module_id);
            }
        } else {
            for module_id in selected {
                self.unmapped(module_id, format!("Module {module_id} has no mapped model."));
            }
        }
    }

    fn unmapped(&mut self, module_id: &str, message: String) {
        self.push(
            Code::MappingIncomplete,
            message,
            "Map exactly one compatible model for this module.",
        )
        .extra
        .insert("module_id".into(), json!(module_id));
    }

    /// The model entry, or `None` after recording why it is unusable.
    fn model_entry(&mut self, model_id: &str) -> Option<ModelEntry> {
        let path = self.layout().models_dir().join(format!("{model_id}.json"));
        match self.registry.models().get(model_id) {
            Ok(Some(entry)) => Some(entry),
            Ok(None) => {
                self.push(
                    Code::RegistryMissing,
                    format!("Missing registry entry {}.", path.display()),
                    "Create the model or import its registry entry.",
                )
                .extra
                .insert("model_id".into(), json!(model_id));
                None
            }
            Err(e) => {
                self.push(
                    Code::RegistryUnreadable,
                    format!("Registry entry {} is unreadable: {e}", path.display()),
                    "Fix or re-create the model entry.",
                )
                .extra
                .insert("model_id".into(), json!(model_id));
                None
            }
        }
    }

    fn metrics_present(&mut self, capability: &str, model_id: &str) {
        if self.registry.metrics().exists(capability, model_id) {
            return;
        }
        let path = self.layout().metrics_path(capability, model_id);
        self.push(
            Code::ArtifactMissing,
            format!("Missing artifact: {}", path.display()),
            "Run evaluation to produce metrics.",
        )
        .extra
        .insert("model_id".into(), json!(model_id));
    }

    fn module_mapping(&mut self, mappings: &Mappings, module_id: &str) {
        let Some(model_id) = mappings.module_map.get(module_id).filter(|m| !m.is_empty()) else {
            self.unmapped(module_id, format!("Module {module_id} has no mapped model."));
            return;
        };
        let Some(entry) = self.model_entry(model_id) else {
            return;
        };

        if let Some(nn_id) = entry.nn_id.as_deref().filter(|id| !id.is_empty()) {
            if !self.registry.neural_nets().exists(nn_id) {
                let path = self.layout().neural_nets_dir().join(format!("{nn_id}.json"));
                self.push(
                    Code::RegistryMissing,
                    format!("Missing registry entry {}.", path.display()),
                    "Create the neural net or import its registry entry.",
                )
                .extra
                .insert("nn_id".into(), json!(nn_id));
            }
        }

        for dataset_id in entry.referenced_datasets() {
            self.dataset(dataset_id);
        }

        let capability = entry
            .capability
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| self.capabilities(module_id).into_iter().next());
        let Some(capability) = capability else {
            return;
        };
        self.metrics_present(&capability, model_id);
        if capability == "chat" {
            self.runnable(&entry);
        }
    }

    fn dataset(&mut self, dataset_id: &str) {
        let path = self.layout().dataset_entries_dir().join(format!("{dataset_id}.json"));
        let entry = match self.registry.datasets().get(dataset_id) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.push(
                    Code::RegistryMissing,
                    format!("Missing registry entry {}.", path.display()),
                    "Register the dataset or import its registry entry.",
                )
                .extra
                .insert("dataset_id".into(), json!(dataset_id));
                return;
            }
            Err(e) => {
                self.push(
                    Code::RegistryUnreadable,
                    format!("Registry entry {} is unreadable: {e}", path.display()),
                    "Fix or re-register the dataset.",
                )
                .extra
                .insert("dataset_id".into(), json!(dataset_id));
                return;
            }
        };

        for problem in self.registry.datasets().verify(&entry) {
            let resolved = self.layout().resolve(&problem.path);
            match problem.error {
                ProblemKind::Missing => {
                    self.push(
                        Code::DatasetMissing,
                        format!("Dataset file missing: {}", resolved.display()),
                        "Re-import the dataset or regenerate it.",
                    )
                    .extra
                    .insert("dataset_id".into(), json!(dataset_id));
                }
                ProblemKind::ChecksumMismatch => {
                    self.push(
                        Code::DatasetChecksumMismatch,
                        format!("Dataset checksum mismatch: {}", resolved.display()),
                        "Regenerate with the same seed or update the registry entry.",
                    )
                    .extra
                    .extend([
                        ("dataset_id".into(), json!(dataset_id)),
                        ("expected".into(), json!(problem.expected)),
                        ("actual".into(), json!(problem.actual)),
                    ]);
                }
            }
        }
    }

    /// A chat model outside retrieval mode needs local weights, tokenizer and adapter.
    fn runnable(&mut self, entry: &ModelEntry) {
        if entry.is_retrieval() {
            return;
        }
        let mut missing_fields = Vec::new();
        if entry.weights_path.as_deref().is_none_or(str::is_empty) {
            missing_fields.push("weights_path");
        }
        if entry.tokenizer_path.as_deref().is_none_or(str::is_empty) {
            missing_fields.push("tokenizer_path");
        }
        if !entry.has_inference_adapter() {
            missing_fields.push("inference_adapter");
        }

        let layout = self.layout();
        let missing_files: Vec<String> = [entry.weights_path.as_deref(), entry.tokenizer_path.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .map(|p| layout.resolve(p))
            .filter(|p| !usable_file(p))
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        if missing_fields.is_empty() && missing_files.is_empty() {
            return;
        }
        let issue = self.push(
            Code::ModelNotRunnable,
            "Model not runnable (no weights).",
            "Attach local weights, a tokenizer and an inference_adapter, or switch the model to retrieval mode.",
        );
        issue.extra.insert("model_id".into(), json!(entry.id));
        if !missing_fields.is_empty() {
            issue.extra.insert("missing_fields".into(), json!(missing_fields));
        }
        if !missing_files.is_empty() {
            issue.extra.insert("missing_files".into(), json!(missing_files));
        }
    }

    fn capability_mapping(&mut self, mappings: &Mappings, module_id: &str) {
        let mut found = false;
        for capability in self.capabilities(module_id) {
            let Some(model_id) = mappings.capability_map.get(&capability).filter(|m| !m.is_empty()) else {
                continue;
            };
            found = true;
            if self.model_entry(model_id).is_some() {
                self.metrics_present(&capability, model_id);
            }
        }
        if !found {
            self.unmapped(module_id, format!("Module {module_id} has no mapped model via capability_map."));
        }
    }

    pub(crate) fn wordnet(&mut self, selected: &[String]) {
        let root = self.layout().wordnet_root();
        if !root.exists() {
            self.push(
                Code::WordnetRootMissing,
                format!("WordNet-3.0 folder not found at {}", root.display()),
                "Place the WordNet-3.0 folder at the workspace root.",
            );
        }

        let chat_selected = selected
            .iter()
            .filter_map(|id| self.manifest(id))
            .any(|m| m.has_capability("chat"));
        if !chat_selected {
            return;
        }

        let index = self.layout().lexicon_index_path();
        if !index.exists() {
            self.push(
                Code::WordnetIndexMissing,
                format!("WordNet index not found at {}", index.display()),
                "Run the lexicon-wordnet3 train job to build the retrieval index.",
            );
        }
        let datasets = self.layout().datasets_dir();
        let has_synth = store::files_with_extension(&datasets, "jsonl").iter().any(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("wordnet_synth_"))
        });
        if !has_synth {
            self.push(
                Code::WordnetSynthMissing,
                format!("Synthetic dialog dataset not found under {}", datasets.display()),
                "Run the lexicon-wordnet3 evaluate job to generate dialogs.",
            );
        }
    }

    pub(crate) fn predictor_sample(&mut self) {
        let listed = self.modules.iter().any(|r| r.id() == PREDICTOR_MODULE_ID);
        let sample = self.layout().predictor_sample_path();
        if listed && !sample.exists() {
            self.push(
                Code::PredictorDatasetMissing,
                format!("Predictor sample dataset not found at {}", sample.display()),
                "Place ohlcv.csv under modules/predictor-finance/data/samples.",
            );
        }
    }

    /// Validate the guardrail config and return the document to report.
    pub(crate) fn guardrails(&mut self) -> Value {
        let doc = match self.registry.guardrails().load_raw() {
            Ok(doc) => doc.unwrap_or_else(default_config),
            Err(e) => {
                self.push(
                    Code::GuardrailsReadFailed,
                    format!("Failed to read guardrails: {e}"),
                    "Reset the guardrails via POST /api/guardrails.",
                );
                return default_config();
            }
        };
        let Some(cfg) = doc.as_object() else {
            self.push(
                Code::GuardrailsReadFailed,
                "Failed to read guardrails: config is not a JSON object",
                "Reset the guardrails via POST /api/guardrails.",
            );
            return default_config();
        };

        let max_tokens_ok = cfg
            .get("max_tokens")
            .and_then(Value::as_i64)
            .is_some_and(|n| n >= 1);
        if !max_tokens_ok {
            self.push(
                Code::GuardrailsInvalid,
                "Guardrails max_tokens must be an integer >= 1.",
                "Set a valid max_tokens in the guardrail config.",
            );
        }
        if cfg
            .get("allowed_file_types")
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
        {
            self.push(
                Code::GuardrailsInvalid,
                "Guardrails allowed_file_types cannot be empty when files are enabled.",
                "Add at least one file extension or disable file access in modules.",
            );
        }
        doc
    }

    pub(crate) fn writable(&mut self) {
        for dir in [self.layout().metrics_dir(), self.layout().traces_dir()] {
            if let Err(e) = try_write(&dir) {
                self.push(
                    Code::FilesystemReadonly,
                    format!("Artifacts directory not writable: {} ({e})", dir.display()),
                    "Fix permissions or path.",
                );
            }
        }
    }
}

fn usable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => !meta.is_file() || meta.len() > 0,
        Err(_) => false,
    }
}

fn try_write(dir: &Path) -> std::io::Result<()> {
    let scratch = dir.join(format!(".__writetest_{}.tmp", uuid::Uuid::new_v4().simple()));
    std::fs::write(&scratch, b"ok")?;
    std::fs::remove_file(&scratch)
}
