use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde_json::{Value, json};

use workbench_core::rng;
use workbench_registry::guardrails::default_config;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/runtime/start", post(start))
        .route("/runtime/stop", post(stop))
        .route("/runtime/post", post(post_message))
}

/// Start is refused until readiness reports `ready`.
pub async fn start(
    Extension(services): Extension<Arc<AppServices>>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    let report = match services
        .blocking(|s| Ok(workbench_readiness::evaluate(s.registry())))
        .await
    {
        Ok(report) => report,
        Err(resp) => return resp,
    };
    if !report.is_ready() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error_code": "workspace_not_ready",
                "human_message": "Workspace is not ready. Resolve readiness errors before starting runtime.",
                "errors": report.errors,
            })),
        )
            .into_response();
    }
    services.set_running(true);
    tracing::info!("runtime started");
    Json(json!({"ok": true, "message": "Runtime start requested", "payload": payload})).into_response()
}

pub async fn stop(
    Extension(services): Extension<Arc<AppServices>>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    let was_running = services.set_running(false);
    tracing::info!(was_running, "runtime stopped");
    Json(json!({"ok": true, "message": "Runtime stop requested", "payload": payload})).into_response()
}

/// One chat turn: guard the input, answer it, guard the answer.
pub async fn post_message(
    Extension(services): Extension<Arc<AppServices>>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    let result = services
        .blocking(move |s| {
            let cfg = s.registry().guardrails().current().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "guardrail config unreadable, using defaults");
                default_config()
            });
            let Some(text) = payload.get("text").and_then(Value::as_str) else {
                return Ok(json!({
                    "ok": true,
                    "received": payload,
                    "processed": null,
                    "answer": null,
                    "guardrails": cfg,
                }));
            };
            let policy = workbench_registry::GuardrailPolicy::from_value(&cfg);
            let mut request_rng = rng::seeded(rng::seed_from_value(payload.get("seed")));
            let reply = s
                .chat()
                .respond(text, &policy, &mut request_rng)
                .map_err(|e| errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "chat_failed", e.to_string()))?;
            Ok(json!({
                "ok": true,
                "received": payload,
                "processed": reply.processed,
                "answer": reply.answer,
                "guardrails": cfg,
            }))
        })
        .await;
    match result {
        Ok(doc) => Json(doc).into_response(),
        Err(resp) => resp,
    }
}
