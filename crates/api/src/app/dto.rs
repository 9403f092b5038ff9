//! Request DTOs and JSON mapping helpers.

use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use workbench_core::rng;
use workbench_jobs::JobRecord;

use crate::app::errors;

/// Body of `POST /api/workspace`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveWorkspaceRequest {
    pub name: Option<String>,
    pub selected_modules: Vec<String>,
    pub seed: Option<u64>,
}

impl SaveWorkspaceRequest {
    /// `selected_modules` must be a list of strings; a missing or malformed
    /// seed falls back to the default one.
    pub fn from_json(body: &Value) -> Result<Self, Response> {
        let selected_modules = match body.get("selected_modules") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid_selection)?,
            Some(_) => return Err(invalid_selection()),
        };
        Ok(Self {
            name: body.get("name").and_then(Value::as_str).map(str::to_string),
            selected_modules,
            seed: body.get("seed").map(|s| rng::seed_from_value(Some(s))),
        })
    }
}

fn invalid_selection() -> Response {
    errors::json_error(
        StatusCode::BAD_REQUEST,
        "invalid_payload",
        "selected_modules must be a list of module ids",
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub capability: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

impl MetricsQuery {
    pub fn capability(&self) -> &str {
        self.capability.as_deref().filter(|c| !c.is_empty()).unwrap_or("chat")
    }
}

/// Decode a registry entry whose `id` may be omitted (one is generated).
pub fn entry_from_json<T: DeserializeOwned>(body: Value) -> Result<T, Response> {
    let mut obj = match body {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    obj.entry("id").or_insert_with(|| json!(""));
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_payload", e.to_string()))
}

/// `{ok, job}` where ok mirrors whether the job finished.
pub fn job_response(record: &JobRecord) -> Value {
    json!({
        "ok": record.status == workbench_jobs::JobStatus::Finished,
        "job": record,
    })
}
