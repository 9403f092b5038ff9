use axum::{
    Router,
    routing::{get, post},
};

pub mod datasets;
pub mod guardrails;
pub mod jobs;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod system;
pub mod workspace;

/// Router for every endpoint mounted under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/modules", get(system::modules))
        .route("/readiness", get(system::readiness))
        .route("/train", post(jobs::train))
        .route("/train/:kind", post(jobs::train_variant))
        .route("/tools/:tool", post(jobs::tool))
        .route("/evaluate", post(jobs::evaluate))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:job_type", post(jobs::run_named))
        .route(
            "/guardrails",
            get(guardrails::get_guardrails).post(guardrails::set_guardrails),
        )
        .merge(workspace::router())
        .merge(registry::router())
        .merge(datasets::router())
        .merge(metrics::router())
        .merge(runtime::router())
}
