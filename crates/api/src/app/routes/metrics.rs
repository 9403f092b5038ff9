use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use crate::app::dto::MetricsQuery;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/metrics/latest", get(latest))
        .route("/metrics/by_id/:file", get(by_id))
}

/// Newest artifact for `capability` (default `chat`), `{}` when there is none.
pub async fn latest(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<MetricsQuery>,
) -> axum::response::Response {
    let result = services
        .blocking(move |s| {
            Ok(s.registry()
                .metrics()
                .latest(query.capability(), query.model_id.as_deref()))
        })
        .await;
    match result {
        Ok(doc) => Json(json!({ "metrics": doc.unwrap_or_else(|| json!({})) })).into_response(),
        Err(resp) => resp,
    }
}

pub async fn by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Path(file): Path<String>,
) -> axum::response::Response {
    match services.blocking(move |s| Ok(s.registry().metrics().by_filename(&file))).await {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "metrics_not_found", "Metrics file not found"),
        Err(resp) => resp,
    }
}
