use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use workbench_core::StoreError;
use workbench_registry::RegistryError;

pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        RegistryError::UnsupportedFormat(fmt) => json_error(
            StatusCode::BAD_REQUEST,
            "unsupported_format",
            format!("Unsupported format: {fmt}"),
        ),
        RegistryError::Store(e @ StoreError::Parse { .. }) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "registry_unreadable", e.to_string())
        }
        other => json_error(StatusCode::INTERNAL_SERVER_ERROR, "registry_error", other.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error_code": code,
            "human_message": message.into(),
        })),
    )
        .into_response()
}
