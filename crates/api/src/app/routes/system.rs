use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use crate::app::services::AppServices;

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "offline": true}))
}

pub async fn modules(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services
        .blocking(|s| Ok(s.registry().catalog().discover()))
        .await
    {
        Ok(modules) => Json(json!({ "modules": modules })).into_response(),
        Err(resp) => resp,
    }
}

pub async fn readiness(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services
        .blocking(|s| Ok(workbench_readiness::evaluate(s.registry())))
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(resp) => resp,
    }
}
