//! Synchronous job scheduler with a registered handler table.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rand::rngs::StdRng;
use serde_json::{Map, Value};
use tracing::{info, warn};

use workbench_core::{JobId, WorkbenchLayout, rng};
use workbench_registry::Registry;
use workbench_runtime::ChatRuntime;

use crate::bodies;
use crate::error::{JobError, JobResult};
use crate::store::{JobStore, JobStoreError};
use crate::types::JobRecord;

/// Output document of a job body.
pub type JobOutput = Map<String, Value>;

/// Job handler function type.
pub type JobHandler = Box<dyn Fn(&mut JobContext<'_>) -> JobResult<JobOutput> + Send + Sync>;

/// Shared state job bodies operate on.
pub struct JobEnv {
    registry: Registry,
    chat: Arc<ChatRuntime>,
}

impl JobEnv {
    pub fn new(layout: WorkbenchLayout) -> Self {
        let chat = Arc::new(ChatRuntime::new(layout.clone()));
        Self::with_chat(Registry::new(layout), chat)
    }

    pub fn with_chat(registry: Registry, chat: Arc<ChatRuntime>) -> Self {
        Self { registry, chat }
    }

    pub fn layout(&self) -> &WorkbenchLayout {
        self.registry.layout()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn chat(&self) -> &Arc<ChatRuntime> {
        &self.chat
    }
}

/// Everything a handler sees for one execution.
pub struct JobContext<'a> {
    pub job_id: &'a JobId,
    pub payload: &'a Map<String, Value>,
    pub seed: u64,
    pub rng: &'a mut StdRng,
    pub env: &'a JobEnv,
}

impl JobContext<'_> {
    pub fn layout(&self) -> &WorkbenchLayout {
        self.env.layout()
    }

    pub fn registry(&self) -> &Registry {
        self.env.registry()
    }

    /// A non-empty string field of the payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn bool_field(&self, key: &str) -> bool {
        match self.payload.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        }
    }

    /// A numeric payload field; numeric strings are accepted.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        match self.payload.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// A non-negative integer field, `default` when absent or malformed.
    pub fn usize_field(&self, key: &str, default: usize) -> usize {
        self.f64_field(key)
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map_or(default, |f| f as usize)
    }

    pub fn module_id(&self) -> Option<&str> {
        self.str_field("module_id")
    }

    /// `module_id`, or [`JobError::UnknownModule`] when missing.
    pub fn require_module(&self) -> JobResult<&str> {
        self.module_id()
            .ok_or_else(|| JobError::UnknownModule("<missing>".to_string()))
    }
}

/// Runs named jobs one at a time and persists their records.
pub struct JobScheduler<S: JobStore> {
    store: S,
    env: JobEnv,
    handlers: HashMap<String, JobHandler>,
}

impl<S: JobStore> JobScheduler<S> {
    /// Scheduler with every built-in handler registered.
    pub fn new(store: S, env: JobEnv) -> Self {
        let mut scheduler = Self::without_builtins(store, env);
        scheduler.register_handler("train", bodies::train::run);
        scheduler.register_handler("evaluate", bodies::evaluate::run);
        scheduler.register_handler("self_eval", bodies::self_eval::run);
        scheduler.register_handler("make_bubbles", bodies::bubbles::run);
        scheduler.register_handler("train_sft", bodies::sft::run);
        scheduler.register_handler("train_dpo", bodies::dpo::run);
        scheduler.register_handler("train_rl", bodies::rl::run);
        scheduler.register_handler("train_cnn", bodies::forecast::run_cnn);
        scheduler.register_handler("train_tsconv", bodies::forecast::run_tsconv);
        scheduler
    }

    pub fn without_builtins(store: S, env: JobEnv) -> Self {
        Self {
            store,
            env,
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for a job type.
    pub fn register_handler<F>(&mut self, job_type: impl Into<String>, handler: F)
    where
        F: Fn(&mut JobContext<'_>) -> JobResult<JobOutput> + Send + Sync + 'static,
    {
        self.handlers.insert(job_type.into(), Box::new(handler));
    }

    pub fn handles(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn env(&self) -> &JobEnv {
        &self.env
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one job to completion.
    ///
    /// The record is persisted as `running` before the body starts and again
    /// in its terminal state. Body failures end up in the record; a failing
    /// job store is returned as an error. A job type that cannot name a
    /// record file is rejected before anything is written.
    pub fn run_job(&self, job_type: &str, payload: Value) -> Result<JobRecord, JobStoreError> {
        if !workbench_core::id::is_file_safe(job_type) {
            warn!(%job_type, "rejected job type");
            return Err(JobStoreError::InvalidJobType(job_type.to_string()));
        }
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let seed = rng::seed_from_value(payload.get("seed"));
        let module_id = payload
            .get("module_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut record = JobRecord::new(JobId::generate(job_type), job_type, module_id, seed);
        record.mark_running();
        self.store.save(&record)?;
        info!(job_id = %record.job_id, %job_type, module_id = ?record.module_id, seed, "job started");

        let mut job_rng = rng::seeded(seed);
        let outcome = {
            let mut ctx = JobContext {
                job_id: &record.job_id,
                payload: &payload,
                seed,
                rng: &mut job_rng,
                env: &self.env,
            };
            self.dispatch(job_type, &mut ctx)
        };

        match outcome {
            Ok(output) => {
                record.mark_finished(Value::Object(output));
                info!(job_id = %record.job_id, "job finished");
            }
            Err(e) => {
                warn!(job_id = %record.job_id, error = %e, "job failed");
                record.mark_failed(e.to_string());
            }
        }

        self.store.save(&record)?;
        Ok(record)
    }

    /// Every persisted record, newest first.
    pub fn list_jobs(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        self.store.list()
    }

    fn dispatch(&self, job_type: &str, ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
        let handler = self
            .handlers
            .get(job_type)
            .ok_or_else(|| JobError::UnknownJobType(job_type.to_string()))?;
        catch_unwind(AssertUnwindSafe(|| handler(ctx))).unwrap_or_else(|panic| {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(JobError::Panicked(msg))
        })
    }
}
