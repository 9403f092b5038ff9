//! Shared state behind the handlers.
//!
//! Everything here is synchronous file I/O; handlers reach it through
//! [`AppServices::blocking`] so the async runtime never stalls on disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use workbench_core::WorkbenchConfig;
use workbench_jobs::{
    BootstrapReport, FsJobStore, JobEnv, JobRecord, JobScheduler, JobStoreError, auto_eval, bootstrap,
};
use workbench_registry::{Mappings, Registry};
use workbench_runtime::ChatRuntime;

use crate::app::errors;

pub struct AppServices {
    registry: Registry,
    chat: Arc<ChatRuntime>,
    /// One job at a time.
    scheduler: Mutex<JobScheduler<FsJobStore>>,
    running: AtomicBool,
}

impl AppServices {
    pub fn new(config: &WorkbenchConfig) -> Self {
        let layout = config.layout();
        let registry = Registry::new(layout.clone());
        let chat = Arc::new(ChatRuntime::new(layout.clone()));
        let env = JobEnv::with_chat(registry.clone(), Arc::clone(&chat));
        let scheduler = JobScheduler::new(FsJobStore::new(layout.jobs_dir()), env);
        Self {
            registry,
            chat,
            scheduler: Mutex::new(scheduler),
            running: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn chat(&self) -> &ChatRuntime {
        &self.chat
    }

    pub fn bootstrap(&self) -> BootstrapReport {
        bootstrap::run(&self.registry)
    }

    pub fn set_running(&self, running: bool) -> bool {
        self.running.swap(running, Ordering::SeqCst)
    }

    /// Run `f` on the blocking pool.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T, Response>
    where
        T: Send + 'static,
        F: FnOnce(&AppServices) -> Result<T, Response> + Send + 'static,
    {
        let services = Arc::clone(self);
        match tokio::task::spawn_blocking(move || f(&services)).await {
            Ok(result) => result,
            Err(e) => Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                format!("background task failed: {e}"),
            )),
        }
    }

    /// Run one job under the scheduler lock.
    pub fn run_job(&self, job_type: &str, payload: Value) -> Result<JobRecord, Response> {
        let scheduler = self.scheduler.lock().map_err(|_| {
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "scheduler_poisoned", "job scheduler is unavailable")
        })?;
        scheduler.run_job(job_type, payload).map_err(|e| match e {
            JobStoreError::InvalidJobType(_) => errors::json_error(StatusCode::BAD_REQUEST, "invalid_job_type", e.to_string()),
            e => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "job_store_failed", e.to_string()),
        })
    }

    pub fn list_jobs(&self) -> Result<Vec<JobRecord>, Response> {
        let scheduler = self.scheduler.lock().map_err(|_| {
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "scheduler_poisoned", "job scheduler is unavailable")
        })?;
        scheduler
            .list_jobs()
            .map_err(|e| errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "job_store_failed", e.to_string()))
    }

    /// Evaluate mapped models lacking metrics; never fails the caller.
    pub fn auto_evaluate(&self, mappings: &Mappings) -> usize {
        match self.scheduler.lock() {
            Ok(scheduler) => auto_eval::evaluate_missing(&scheduler, mappings).len(),
            Err(_) => {
                tracing::warn!("auto-evaluation skipped: scheduler unavailable");
                0
            }
        }
    }
}
