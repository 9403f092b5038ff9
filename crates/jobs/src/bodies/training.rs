//! Shared plumbing of the `train_*` jobs: run directories and dialog sources.
//!
//! Every training run owns `artifacts/<area>/<name>_<seed>/` holding its
//! checkpoint, `metrics.json` and a `run.json` manifest.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use workbench_core::{WorkbenchLayout, store, time};

use crate::error::JobResult;
use crate::scheduler::{JobContext, JobOutput};

const SYNTH_PREFIX: &str = "wordnet_synth_";

pub struct TrainingRun {
    job: &'static str,
    seed: u64,
    dir: PathBuf,
    checkpoint: PathBuf,
}

impl TrainingRun {
    pub fn new(ctx: &JobContext<'_>, job: &'static str, area: &str, name: &str) -> Self {
        let dir = ctx.layout().run_dir(area, name, ctx.seed);
        let checkpoint = dir.join(format!("ckpt_{name}_{}.json", ctx.seed));
        Self {
            job,
            seed: ctx.seed,
            dir,
            checkpoint,
        }
    }

    /// Persist checkpoint, metrics and manifest; returns `{run_dir, metrics, run}`.
    ///
    /// `job` and `seed` are added to `metrics`.
    pub fn finish(
        self,
        layout: &WorkbenchLayout,
        checkpoint: &Value,
        mut metrics: Map<String, Value>,
        dataset_hash: Option<String>,
    ) -> JobResult<JobOutput> {
        metrics.insert("job".into(), json!(self.job));
        metrics.insert("seed".into(), json!(self.seed));
        let metrics_path = self.dir.join("metrics.json");
        store::save_json(&self.checkpoint, checkpoint)?;
        store::save_json(&metrics_path, &metrics)?;

        let run = json!({
            "job": self.job,
            "seed": self.seed,
            "created_at": time::now_iso(),
            "code_version": env!("CARGO_PKG_VERSION"),
            "dataset_hash": dataset_hash,
            "artifacts": {
                "ckpt": layout.relativize(&self.checkpoint),
                "metrics": layout.relativize(&metrics_path),
            },
        });
        store::save_json(&self.dir.join("run.json"), &run)?;
        tracing::info!(job = self.job, seed = self.seed, dir = %self.dir.display(), "training run written");

        let mut out = JobOutput::new();
        out.insert("run_dir".into(), json!(layout.relativize(&self.dir)));
        out.insert("metrics".into(), Value::Object(metrics));
        out.insert("run".into(), run);
        Ok(out)
    }
}

/// Uploaded `*.jsonl` datasets, sorted by file name.
pub fn upload_sources(layout: &WorkbenchLayout) -> Vec<PathBuf> {
    store::files_with_extension(&layout.uploads_dir(), "jsonl")
}

/// Synthetic `wordnet_synth_*.jsonl` dialog files, sorted by file name.
pub fn synth_sources(layout: &WorkbenchLayout) -> Vec<PathBuf> {
    store::files_with_extension(&layout.datasets_dir(), "jsonl")
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SYNTH_PREFIX))
        })
        .collect()
}

/// Uploads first, then synthetic dialogs.
pub fn dialog_sources(layout: &WorkbenchLayout) -> Vec<PathBuf> {
    let mut sources = upload_sources(layout);
    sources.extend(synth_sources(layout));
    sources
}

/// Up to `limit` non-blank lines of a jsonl file. Lines that are not JSON
/// objects become `{"text": line}`.
pub fn read_rows(path: &Path, limit: usize) -> Vec<Map<String, Value>> {
    let Ok(file) = File::open(path) else {
        tracing::warn!(path = %path.display(), "dialog source unreadable");
        return Vec::new();
    };
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .take(limit)
        .map(|line| match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(obj)) => obj,
            _ => {
                let mut obj = Map::new();
                obj.insert("text".into(), json!(line.trim()));
                obj
            }
        })
        .collect()
}

/// First of `keys` holding a non-empty value, rendered as text.
pub fn text_field(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null | Value::Bool(false) => None,
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_wrap_plain_lines_as_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("d.jsonl");
        std::fs::write(&path, "{\"prompt\":\"p\",\"response\":\"r\"}\n\nplain line\n[1]\n").unwrap();
        let rows = read_rows(&path, 10);
        assert_eq!(rows.len(), 3);
        assert_eq!(text_field(&rows[0], &["response", "text"]).as_deref(), Some("r"));
        assert_eq!(text_field(&rows[1], &["prompt", "text"]).as_deref(), Some("plain line"));
        assert_eq!(text_field(&rows[2], &["text"]).as_deref(), Some("[1]"));
        assert_eq!(read_rows(&path, 1).len(), 1);
        assert!(read_rows(&tmp.path().join("absent.jsonl"), 10).is_empty());
    }

    #[test]
    fn empty_strings_fall_through_to_later_keys() {
        let row = json!({"response": "", "text": 3}).as_object().cloned().unwrap();
        assert_eq!(text_field(&row, &["response", "text"]).as_deref(), Some("3"));
        assert_eq!(text_field(&row, &["prompt"]), None);
    }

    #[test]
    fn uploads_come_before_synthetic_dialogs() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkbenchLayout::new(tmp.path());
        std::fs::create_dir_all(layout.uploads_dir()).unwrap();
        std::fs::write(layout.uploads_dir().join("mine.jsonl"), "x\n").unwrap();
        std::fs::write(layout.synth_dialogs_path(3), "y\n").unwrap();
        std::fs::write(layout.datasets_dir().join("other.jsonl"), "z\n").unwrap();
        let names: Vec<String> = dialog_sources(&layout)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["mine.jsonl", "wordnet_synth_3.jsonl"]);
    }
}
