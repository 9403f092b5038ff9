//! `make_bubbles`: prompt-length histogram of a dialog dataset.

use std::path::PathBuf;

use serde_json::{Map, Value, json};

use workbench_core::{WorkbenchLayout, id, store, time};

use super::training::{self, read_rows, text_field};
use crate::error::{JobError, JobResult};
use crate::scheduler::{JobContext, JobOutput};

pub const DEFAULT_DATASET: &str = "wordnet_synth";
pub const DEFAULT_BUCKETS: [usize; 5] = [16, 32, 64, 128, 256];
/// Rows read from the chosen source.
pub const ROW_LIMIT: usize = 1_000;

/// Upload named `dataset_id`, else synthetic dialogs, else any upload.
fn candidate_sources(layout: &WorkbenchLayout, dataset_id: &str) -> Vec<PathBuf> {
    let uploads = training::upload_sources(layout);
    let named: Vec<PathBuf> = uploads
        .iter()
        .filter(|p| p.file_stem().is_some_and(|s| s == dataset_id))
        .cloned()
        .collect();
    if !named.is_empty() {
        return named;
    }
    let synth = training::synth_sources(layout);
    if !synth.is_empty() {
        return synth;
    }
    uploads
}

/// Count each length into the first bucket whose ceiling holds it; longer
/// values land in `"> <last ceiling>"`.
pub fn bucketize(lengths: impl IntoIterator<Item = usize>, ceilings: &[usize]) -> Map<String, Value> {
    let mut counts = vec![0u64; ceilings.len() + 1];
    for len in lengths {
        let slot = ceilings.iter().position(|c| len <= *c).unwrap_or(ceilings.len());
        counts[slot] += 1;
    }
    let overflow = ceilings.last().map_or_else(|| "> 0".to_string(), |c| format!("> {c}"));
    ceilings
        .iter()
        .map(|c| format!("<= {c}"))
        .chain(std::iter::once(overflow))
        .zip(counts)
        .map(|(k, n)| (k, json!(n)))
        .collect()
}

fn ceilings(ctx: &JobContext<'_>) -> JobResult<Vec<usize>> {
    let Some(raw) = ctx.payload.get("buckets") else {
        return Ok(DEFAULT_BUCKETS.to_vec());
    };
    let mut ceilings = raw
        .as_array()
        .and_then(|items| items.iter().map(|v| v.as_u64().map(|n| n as usize)).collect::<Option<Vec<_>>>())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| JobError::InvalidPayload("buckets must be a non-empty list of integers".into()))?;
    ceilings.sort_unstable();
    ceilings.dedup();
    Ok(ceilings)
}

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let dataset_id = ctx.str_field("dataset_id").unwrap_or(DEFAULT_DATASET).to_string();
    if !id::is_file_safe(&dataset_id) {
        return Err(JobError::InvalidPayload(format!("invalid dataset_id: {dataset_id:?}")));
    }
    let ceilings = ceilings(ctx)?;

    let sources = candidate_sources(ctx.layout(), &dataset_id);
    let rows = sources
        .first()
        .map(|path| read_rows(path, ROW_LIMIT))
        .unwrap_or_default();
    let lengths = rows.iter().map(|row| {
        text_field(row, &["prompt", "text", "question"])
            .map_or(0, |p| p.chars().count())
    });
    let buckets = bucketize(lengths, &ceilings);

    let out_path = ctx
        .layout()
        .bubble_dir()
        .join(format!("bubbles_{dataset_id}_{}.json", ctx.seed));
    let doc = json!({
        "dataset_id": dataset_id,
        "seed": ctx.seed,
        "built_at": time::now_iso(),
        "buckets": buckets,
        "count": rows.len(),
        "source_count": sources.len(),
    });
    store::save_json(&out_path, &doc)?;
    tracing::info!(%dataset_id, rows = rows.len(), "bubbles written");

    let mut out = JobOutput::new();
    out.insert("bubbles".into(), json!(ctx.layout().relativize(&out_path)));
    out.insert("count".into(), json!(rows.len()));
    Ok(out)
}
