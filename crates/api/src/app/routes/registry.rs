use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::get};
use serde_json::{Value, json};

use workbench_registry::{ModelEntry, NeuralNetSpec};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/registry/models", get(list_models).post(create_model))
        .route("/registry/neural_nets", get(list_neural_nets).post(create_neural_net))
}

pub async fn list_models(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.blocking(|s| Ok(s.registry().models().list())).await {
        Ok(models) => Json(json!({ "models": models })).into_response(),
        Err(resp) => resp,
    }
}

pub async fn create_model(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let entry: ModelEntry = match dto::entry_from_json(body) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let result = services
        .blocking(move |s| {
            s.registry()
                .models()
                .create(entry)
                .map_err(errors::registry_error_to_response)
        })
        .await;
    match result {
        Ok(model) => Json(json!({"ok": true, "model": model})).into_response(),
        Err(resp) => resp,
    }
}

/// Lists neural nets after registering any catalog architecture not yet present.
pub async fn list_neural_nets(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let result = services
        .blocking(|s| {
            let nets = s.registry().neural_nets();
            if let Err(e) = nets.seed_from_catalog(&s.registry().layout().nn_catalog_path()) {
                tracing::warn!(error = %e, "neural-net catalog not seeded");
            }
            Ok(nets.list())
        })
        .await;
    match result {
        Ok(items) => Json(json!({ "neural_nets": items })).into_response(),
        Err(resp) => resp,
    }
}

pub async fn create_neural_net(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let spec: NeuralNetSpec = match dto::entry_from_json(body) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let result = services
        .blocking(move |s| {
            s.registry()
                .neural_nets()
                .create(spec)
                .map_err(errors::registry_error_to_response)
        })
        .await;
    match result {
        Ok(net) => Json(json!({"ok": true, "neural_net": net})).into_response(),
        Err(resp) => resp,
    }
}
