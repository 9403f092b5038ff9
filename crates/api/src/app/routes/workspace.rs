use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::get};
use serde_json::{Value, json};

use workbench_registry::Mappings;

use crate::app::dto::SaveWorkspaceRequest;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/workspace", get(get_workspace).post(save_workspace))
        .route("/workspace/mappings", get(get_mappings).post(save_mappings))
}

pub async fn get_workspace(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let result = services
        .blocking(|s| s.registry().workspace().get().map_err(errors::registry_error_to_response))
        .await;
    match result {
        Ok(ws) => Json(ws).into_response(),
        Err(resp) => resp,
    }
}

pub async fn save_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let req = match SaveWorkspaceRequest::from_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let result = services
        .blocking(move |s| {
            s.registry()
                .workspace()
                .save(req.name, req.selected_modules, req.seed)
                .map_err(errors::registry_error_to_response)
        })
        .await;
    match result {
        Ok(ws) => Json(json!({"ok": true, "workspace": ws})).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_mappings(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let result = services
        .blocking(|s| {
            s.registry()
                .workspace()
                .mappings_or_default()
                .map_err(errors::registry_error_to_response)
        })
        .await;
    match result {
        Ok(m) => Json(m).into_response(),
        Err(resp) => resp,
    }
}

/// Replace the mappings, then evaluate any newly mapped model without metrics.
pub async fn save_mappings(
    Extension(services): Extension<Arc<AppServices>>,
    Json(mappings): Json<Mappings>,
) -> axum::response::Response {
    let result = services
        .blocking(move |s| {
            let saved = s
                .registry()
                .workspace()
                .save_mappings(mappings)
                .map_err(errors::registry_error_to_response)?;
            let evaluated = s.auto_evaluate(&saved);
            Ok((saved, evaluated))
        })
        .await;
    match result {
        Ok((saved, evaluated)) => {
            Json(json!({"ok": true, "mappings": saved, "evaluated": evaluated})).into_response()
        }
        Err(resp) => resp,
    }
}
