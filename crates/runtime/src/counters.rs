//! Per-lemma observation counts: `artifacts/chat/lm_counts.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use workbench_core::store;

use crate::error::RuntimeResult;

#[derive(Debug)]
pub struct ObservationCounters {
    path: PathBuf,
    // Held across the read-modify-write of `increment`.
    write_lock: Mutex<()>,
}

impl ObservationCounters {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Current counts; an unreadable file counts as empty.
    pub fn load(&self) -> BTreeMap<String, u64> {
        match store::load_json_opt(&self.path) {
            Ok(counts) => counts.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "observation counters unreadable");
                BTreeMap::new()
            }
        }
    }

    /// Bump one lemma and persist; returns the new count.
    pub fn increment(&self, lemma: &str) -> RuntimeResult<u64> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = self.load();
        let n = counts.entry(lemma.to_string()).or_insert(0);
        *n += 1;
        let n = *n;
        store::save_json(&self.path, &counts)?;
        Ok(n)
    }

    /// Highest count, ties broken by lexicographic order.
    pub fn most_seen(&self) -> Option<String> {
        self.load()
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(lemma, _)| lemma)
    }
}
