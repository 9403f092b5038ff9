//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the registry, job scheduler and chat runtime shared by handlers
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use workbench_core::WorkbenchConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Runs the offline bootstrap before returning; bootstrap problems are
/// logged and never prevent the API from starting.
pub async fn build_app(config: WorkbenchConfig) -> Router {
    let services = Arc::new(services::AppServices::new(&config));

    let bootstrap = Arc::clone(&services);
    match tokio::task::spawn_blocking(move || bootstrap.bootstrap()).await {
        Ok(report) => tracing::debug!(warnings = report.warnings.len(), "bootstrap finished"),
        Err(e) => tracing::warn!(error = %e, "bootstrap task failed"),
    }

    Router::new()
        .nest("/api", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
