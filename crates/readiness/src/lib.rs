//! Workspace readiness: a ready/blocked verdict with every blocking problem
//! itemized.
//!
//! Checks run in a fixed order and never stop early, so one pass reports
//! everything that needs fixing.

mod checks;
pub mod issue;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use workbench_registry::{Registry, Workspace};

pub use issue::{ReadinessCode, ReadinessIssue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    Ready,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessReport {
    pub status: ReadinessStatus,
    pub errors: Vec<ReadinessIssue>,
    pub workspace: Workspace,
    pub guardrails: Value,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }

    /// Error codes in report order.
    pub fn codes(&self) -> Vec<ReadinessCode> {
        self.errors.iter().map(|e| e.error_code).collect()
    }
}

/// Evaluate the workspace under `registry`'s root.
pub fn evaluate(registry: &Registry) -> ReadinessReport {
    let mut checker = checks::Checker::new(registry);
    checker.manifests();
    let workspace = checker.workspace();
    checker.mappings(&workspace.selected_modules);
    checker.wordnet(&workspace.selected_modules);
    checker.predictor_sample();
    let guardrails = checker.guardrails();
    checker.writable();

    let errors = checker.issues;
    let status = if errors.is_empty() {
        ReadinessStatus::Ready
    } else {
        ReadinessStatus::Blocked
    };
    info!(status = ?status, errors = errors.len(), "readiness evaluated");
    ReadinessReport {
        status,
        errors,
        workspace,
        guardrails,
    }
}
