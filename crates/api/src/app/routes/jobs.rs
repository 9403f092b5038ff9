use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::app::dto;
use crate::app::services::AppServices;

async fn run(services: Arc<AppServices>, job_type: String, payload: Value) -> axum::response::Response {
    match services.blocking(move |s| s.run_job(&job_type, payload)).await {
        Ok(record) => Json(dto::job_response(&record)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn train(
    Extension(services): Extension<Arc<AppServices>>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    run(services, "train".to_string(), payload).await
}

pub async fn evaluate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    run(services, "evaluate".to_string(), payload).await
}

/// `train_<kind>` jobs such as `train_sft` or `train_rl`.
pub async fn train_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(kind): Path<String>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    run(services, format!("train_{kind}"), payload).await
}

/// Tool jobs: `make_bubbles`, `self_eval`.
pub async fn tool(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tool): Path<String>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    run(services, tool, payload).await
}

/// Any registered job type; unknown names come back as a failed record.
pub async fn run_named(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_type): Path<String>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    run(services, job_type, payload).await
}

pub async fn list_jobs(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.blocking(|s| s.list_jobs()).await {
        Ok(jobs) => Json(json!({ "jobs": jobs })).into_response(),
        Err(resp) => resp,
    }
}
