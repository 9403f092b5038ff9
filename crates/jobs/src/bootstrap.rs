//! Offline startup assets: lexicon index, seed dialogs, sample datasets and
//! the neural-net catalog. Each step is best effort.

use serde::Serialize;
use tracing::{info, warn};

use workbench_core::rng::DEFAULT_SEED;
use workbench_registry::Registry;
use workbench_runtime::lexicon;

use crate::bodies::synth;

pub const PREDICTOR_SAMPLE_DATASET: &str = "predictor_ohlcv_sample";

/// Id of the registered synthetic dialog dataset for a seed.
pub fn synth_dataset_id(seed: u64) -> String {
    format!("wordnet_synth_{seed}")
}

/// What a bootstrap pass did; `warnings` holds every step that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub index_records: Option<usize>,
    pub dialogs_created: bool,
    pub datasets_registered: Vec<String>,
    pub neural_nets_seeded: usize,
    pub warnings: Vec<String>,
}

impl BootstrapReport {
    fn warn(&mut self, step: &str, err: impl std::fmt::Display) {
        warn!(step, error = %err, "bootstrap step failed");
        self.warnings.push(format!("{step}: {err}"));
    }
}

pub fn run(registry: &Registry) -> BootstrapReport {
    let layout = registry.layout();
    let mut report = BootstrapReport::default();

    if let Err(e) = layout.ensure_dirs() {
        report.warn("directories", e);
    }

    let index = layout.lexicon_index_path();
    let dict = layout.wordnet_dict_dir();
    if !index.exists() && dict.is_dir() {
        match lexicon::build_index(&dict, &index) {
            Ok(n) => report.index_records = Some(n),
            Err(e) => report.warn("lexicon_index", e),
        }
    }

    let dialogs = layout.synth_dialogs_path(DEFAULT_SEED);
    if !dialogs.exists() {
        match synth::ensure_dialogs(layout, DEFAULT_SEED) {
            Ok(_) => report.dialogs_created = true,
            Err(e) => report.warn("synthetic_dialogs", e),
        }
    }

    let datasets = registry.datasets();
    let synth_id = synth_dataset_id(DEFAULT_SEED);
    if !datasets.exists(&synth_id) && dialogs.exists() {
        let name = format!("WordNet Synthetic Dialogs ({DEFAULT_SEED})");
        match datasets.register(&synth_id, &name, &[dialogs]) {
            Ok(_) => report.datasets_registered.push(synth_id),
            Err(e) => report.warn("register_dialogs", e),
        }
    }

    let sample = layout.predictor_sample_path();
    if sample.exists() && !datasets.exists(PREDICTOR_SAMPLE_DATASET) {
        match datasets.register(PREDICTOR_SAMPLE_DATASET, "Predictor OHLCV Sample", &[sample]) {
            Ok(_) => report.datasets_registered.push(PREDICTOR_SAMPLE_DATASET.to_string()),
            Err(e) => report.warn("register_predictor_sample", e),
        }
    }

    if let Err(e) = std::fs::create_dir_all(layout.uploads_dir()) {
        report.warn("uploads_dir", e);
    }

    match registry.neural_nets().seed_from_catalog(&layout.nn_catalog_path()) {
        Ok(n) => report.neural_nets_seeded = n,
        Err(e) => report.warn("neural_net_catalog", e),
    }

    info!(
        index_records = ?report.index_records,
        dialogs_created = report.dialogs_created,
        datasets = report.datasets_registered.len(),
        neural_nets = report.neural_nets_seeded,
        warnings = report.warnings.len(),
        "bootstrap complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use workbench_core::WorkbenchLayout;

    #[test]
    fn empty_root_gets_dialogs_and_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Registry::new(WorkbenchLayout::new(tmp.path()));

        let report = run(&registry);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.index_records, None);
        assert!(report.dialogs_created);
        assert_eq!(report.datasets_registered, vec!["wordnet_synth_1337".to_string()]);
        assert!(tmp.path().join("artifacts/datasets/uploads").is_dir());

        let entry = registry.datasets().get("wordnet_synth_1337").unwrap().unwrap();
        assert_eq!(entry.name, "WordNet Synthetic Dialogs (1337)");
        assert!(registry.datasets().verify(&entry).is_empty());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Registry::new(WorkbenchLayout::new(tmp.path()));
        run(&registry);
        let again = run(&registry);
        assert_eq!(again, BootstrapReport::default());
    }

    #[test]
    fn index_sample_and_catalog_are_picked_up() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkbenchLayout::new(tmp.path());
        std::fs::create_dir_all(layout.wordnet_dict_dir()).unwrap();
        std::fs::write(layout.wordnet_dict_dir().join("index.noun"), "apple n 1 1 @ 1 0 07739125\n").unwrap();
        std::fs::create_dir_all(layout.predictor_sample_path().parent().unwrap()).unwrap();
        std::fs::write(layout.predictor_sample_path(), "date,close\nd1,1.0\n").unwrap();
        std::fs::write(
            layout.nn_catalog_path(),
            "architectures:\n  - id: nn_mlp\n    family: feedforward\n",
        )
        .unwrap();

        let registry = Registry::new(layout);
        let report = run(&registry);
        assert_eq!(report.index_records, Some(1));
        assert_eq!(report.neural_nets_seeded, 1);
        assert!(report.datasets_registered.contains(&PREDICTOR_SAMPLE_DATASET.to_string()));
    }
}
