use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use workbench_registry::IngestRequest;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/datasets", get(list_datasets))
        .route("/datasets/ingest", post(ingest_dataset))
}

pub async fn list_datasets(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.blocking(|s| Ok(s.registry().datasets().list())).await {
        Ok(items) => Json(json!({ "datasets": items })).into_response(),
        Err(resp) => resp,
    }
}

pub async fn ingest_dataset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<IngestRequest>,
) -> axum::response::Response {
    let result = services
        .blocking(move |s| {
            s.registry()
                .datasets()
                .ingest(req)
                .map_err(errors::registry_error_to_response)
        })
        .await;
    match result {
        Ok(entry) => Json(json!({"ok": true, "dataset": entry})).into_response(),
        Err(resp) => resp,
    }
}
