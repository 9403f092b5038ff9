use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::{Value, json};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn get_guardrails(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let result = services
        .blocking(|s| s.registry().guardrails().current().map_err(errors::registry_error_to_response))
        .await;
    match result {
        Ok(cfg) => Json(cfg).into_response(),
        Err(resp) => resp,
    }
}

pub async fn set_guardrails(
    Extension(services): Extension<Arc<AppServices>>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    let result = services
        .blocking(move |s| {
            s.registry()
                .guardrails()
                .update(&payload)
                .map_err(errors::registry_error_to_response)
        })
        .await;
    match result {
        Ok(cfg) => Json(json!({"ok": true, "guardrails": cfg})).into_response(),
        Err(resp) => resp,
    }
}
