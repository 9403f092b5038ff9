//! Job records and their lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use workbench_core::JobId;
use workbench_core::time::now_iso;

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// Persisted audit trail of one job execution.
///
/// Once terminal, exactly one of `result` and `error` is set: `result` for
/// [`JobStatus::Finished`], `error` for [`JobStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub module_id: Option<String>,
    pub seed: u64,
    pub created_at: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(job_id: JobId, job_type: impl Into<String>, module_id: Option<String>, seed: u64) -> Self {
        Self {
            job_id,
            job_type: job_type.into(),
            module_id,
            seed,
            created_at: now_iso(),
            status: JobStatus::Pending,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
    }

    pub fn mark_finished(&mut self, result: Value) {
        self.status = JobStatus::Finished;
        self.finished_at = Some(now_iso());
        self.result = Some(result);
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.finished_at = Some(now_iso());
        self.error = Some(error.into());
        self.result = None;
    }

    /// Status, outcome fields and `finished_at` agree with each other.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Pending | JobStatus::Running => {
                self.result.is_none() && self.error.is_none() && self.finished_at.is_none()
            }
            JobStatus::Finished => {
                self.result.is_some() && self.error.is_none() && self.finished_at.is_some()
            }
            JobStatus::Failed => {
                self.error.is_some() && self.result.is_none() && self.finished_at.is_some()
            }
        }
    }
}
