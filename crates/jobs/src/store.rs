//! Job record storage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use workbench_core::{JobId, StoreError, store};

use crate::types::JobRecord;

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Insert or replace a record.
    fn save(&self, record: &JobRecord) -> Result<(), JobStoreError>;

    /// Get a record by id.
    fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, JobStoreError>;

    /// Every readable record, newest first.
    fn list(&self) -> Result<Vec<JobRecord>, JobStoreError>;
}

/// Job store error.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid job id: {0:?}")]
    InvalidId(String),
    #[error("invalid job type: {0:?}")]
    InvalidJobType(String),
}

fn newest_first(records: &mut [JobRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.job_id.cmp(&a.job_id))
    });
}

/// One JSON document per job under `artifacts/jobs/`.
#[derive(Debug, Clone)]
pub struct FsJobStore {
    dir: PathBuf,
}

impl FsJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }
}

impl JobStore for FsJobStore {
    fn save(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        if !record.job_id.is_file_safe() {
            return Err(JobStoreError::InvalidId(record.job_id.to_string()));
        }
        store::save_json(&self.path(&record.job_id), record)?;
        Ok(())
    }

    fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, JobStoreError> {
        if !job_id.is_file_safe() {
            return Ok(None);
        }
        Ok(store::load_json_opt(&self.path(job_id))?)
    }

    fn list(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        let mut records: Vec<JobRecord> = store::list_json(&self.dir);
        newest_first(&mut records);
        Ok(records)
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn save(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".into()))?;
        jobs.insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".into()))?;
        Ok(jobs.get(job_id).cloned())
    }

    fn list(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".into()))?;
        let mut records: Vec<JobRecord> = jobs.values().cloned().collect();
        newest_first(&mut records);
        Ok(records)
    }
}

impl<S: JobStore + ?Sized> JobStore for std::sync::Arc<S> {
    fn save(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        (**self).save(record)
    }

    fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, JobStoreError> {
        (**self).get(job_id)
    }

    fn list(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        (**self).list()
    }
}
