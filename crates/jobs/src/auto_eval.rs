//! Evaluate freshly mapped models that have no metrics yet.

use serde_json::json;
use tracing::warn;

use workbench_registry::Mappings;

use crate::scheduler::JobScheduler;
use crate::store::JobStore;
use crate::types::JobRecord;

/// Run `evaluate` for every mapped `(module, model)` pair whose metrics
/// artifact is missing. Failures are logged and skipped.
pub fn evaluate_missing<S: JobStore>(scheduler: &JobScheduler<S>, mappings: &Mappings) -> Vec<JobRecord> {
    let registry = scheduler.env().registry();
    let workspace = match registry.workspace().get() {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "auto-evaluation skipped: workspace unreadable");
            return Vec::new();
        }
    };
    let modules = registry.catalog().discover();
    let capabilities_of = |module_id: &str| -> Vec<String> {
        modules
            .iter()
            .find(|m| m.id() == module_id)
            .and_then(|m| m.manifest())
            .map(|m| m.capabilities.clone())
            .unwrap_or_default()
    };

    let mut pairs: Vec<(String, String)> = mappings
        .module_map
        .iter()
        .filter(|(module, model)| !module.is_empty() && !model.is_empty())
        .map(|(module, model)| (module.clone(), model.clone()))
        .collect();
    for module in &workspace.selected_modules {
        for capability in capabilities_of(module) {
            if let Some(model) = mappings.capability_map.get(&capability).filter(|m| !m.is_empty()) {
                pairs.push((module.clone(), model.clone()));
            }
        }
    }

    let mut records = Vec::new();
    for (module_id, model_id) in pairs {
        let capability = registry
            .models()
            .get(&model_id)
            .ok()
            .flatten()
            .and_then(|m| m.capability)
            .or_else(|| capabilities_of(&module_id).into_iter().next());
        let Some(capability) = capability else {
            continue;
        };
        if registry.metrics().exists(&capability, &model_id) {
            continue;
        }
        let payload = json!({"module_id": module_id, "seed": workspace.seed, "model_id": model_id});
        match scheduler.run_job("evaluate", payload) {
            Ok(record) => records.push(record),
            Err(e) => warn!(%module_id, %model_id, error = %e, "auto-evaluation failed"),
        }
    }
    records
}
