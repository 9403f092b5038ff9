//! `train_sft`: supervised fine-tuning of the character n-gram model.
//!
//! Training re-counts transitions sampled from the training split, which
//! sharpens the model toward the dataset's phrasing. Perplexity on the
//! held-out split is reported before and after.

use rand::seq::SliceRandom;
use serde_json::{Map, json};

use workbench_core::{rng, store};
use workbench_runtime::NgramModel;
use workbench_runtime::ngram::{Counts, MAX_CONTEXTS};

use super::evaluate::round_to;
use super::synth;
use super::training::{self, TrainingRun, read_rows, text_field};
use crate::error::JobResult;
use crate::scheduler::{JobContext, JobOutput};

pub const DEFAULT_ORDER: usize = 3;
pub const DEFAULT_STEPS: usize = 5;
/// Corpus items gathered across all sources.
pub const CORPUS_LIMIT: usize = 2_000;
/// Positions reinforced per training step.
const POSITIONS_PER_STEP: usize = 200;
/// Positions sampled per step, before the cap, is about `len / STRIDE_DIVISOR`.
const STRIDE_DIVISOR: usize = 50;
const SMOOTHING: f64 = 0.1;
const VOCAB: f64 = 128.0;

/// Add-alpha smoothed perplexity of `text`; infinite when shorter than a context.
pub fn perplexity(counts: &Counts, text: &str, order: usize) -> f64 {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= order {
        return f64::INFINITY;
    }
    let mut nll = 0.0;
    let mut n = 0usize;
    for window in chars.windows(order + 1) {
        let ctx: String = window[..order].iter().collect();
        let next = window[order].to_string();
        let (hit, total) = counts.get(&ctx).map_or((0, 0), |bucket| {
            (bucket.get(&next).copied().unwrap_or(0), bucket.values().sum::<u64>())
        });
        let p = (hit as f64 + SMOOTHING) / (total as f64 + SMOOTHING * VOCAB);
        nll -= p.max(1e-12).ln();
        n += 1;
    }
    (nll / n as f64).exp()
}

/// One reinforcement pass per step over a shuffled, strided sample of positions.
pub fn reinforce(counts: &mut Counts, text: &str, order: usize, steps: usize, seed: u64) {
    let chars: Vec<char> = text.chars().collect();
    let span = chars.len().saturating_sub(order);
    if span == 0 {
        return;
    }
    let stride = (span / STRIDE_DIVISOR).max(1);
    for step in 0..steps {
        let mut step_rng = rng::seeded(seed.wrapping_add(step as u64));
        let mut positions: Vec<usize> = (0..span).step_by(stride).collect();
        positions.shuffle(&mut step_rng);
        for &i in positions.iter().take(POSITIONS_PER_STEP) {
            let ctx: String = chars[i..i + order].iter().collect();
            *counts
                .entry(ctx)
                .or_default()
                .entry(chars[i + order].to_string())
                .or_insert(0) += 1;
        }
    }
}

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let order = ctx.usize_field("order", DEFAULT_ORDER).max(1);
    let steps = ctx.usize_field("steps", DEFAULT_STEPS);

    let mut sources = training::dialog_sources(ctx.layout());
    if sources.is_empty() {
        sources.push(synth::ensure_dialogs(ctx.layout(), ctx.seed)?);
    }
    let corpus: Vec<String> = sources
        .iter()
        .flat_map(|path| read_rows(path, CORPUS_LIMIT))
        .filter_map(|row| text_field(&row, &["response", "text", "prompt"]))
        .take(CORPUS_LIMIT)
        .collect();

    let split = corpus.len() * 9 / 10;
    let train = corpus[..split].join("\n");
    let val = if split < corpus.len() {
        corpus[split..].join("\n")
    } else {
        corpus[..corpus.len() / 10].join("\n")
    };

    let base = NgramModel::build(&train, order, ctx.seed);
    let ppl_base = perplexity(&base.counts, &val, order);
    let mut counts = base.counts;
    reinforce(&mut counts, &train, order, steps, ctx.seed);
    let ppl_trained = perplexity(&counts, &val, order);

    let mut metrics = Map::new();
    metrics.insert("order".into(), json!(order));
    metrics.insert("items".into(), json!(corpus.len()));
    metrics.insert("ppl_base".into(), finite_or_null(ppl_base));
    metrics.insert("ppl_trained".into(), finite_or_null(ppl_trained));
    metrics.insert("improved".into(), json!(ppl_trained < ppl_base));

    let capped: Counts = counts.into_iter().take(MAX_CONTEXTS).collect();
    let checkpoint = json!({ "order": order, "counts": capped, "seed": ctx.seed });
    let dataset_hash = store::sha256_files(&sources)?;
    TrainingRun::new(ctx, "train_sft", "chat", "sft").finish(ctx.layout(), &checkpoint, metrics, Some(dataset_hash))
}

fn finite_or_null(x: f64) -> serde_json::Value {
    if x.is_finite() { json!(round_to(x, 6)) } else { serde_json::Value::Null }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobEnv, JobScheduler};
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;
    use workbench_core::WorkbenchLayout;

    #[test]
    fn unseen_model_has_vocabulary_perplexity() {
        let ppl = perplexity(&Counts::new(), "abcdef", 3);
        assert!((ppl - VOCAB).abs() < 1e-9, "{ppl}");
        assert!(perplexity(&Counts::new(), "abc", 3).is_infinite());
    }

    #[test]
    fn reinforcing_the_evaluated_text_lowers_its_perplexity() {
        let text = "the cat sat on the mat. ".repeat(10);
        let base = NgramModel::build(&text, 3, 1);
        let before = perplexity(&base.counts, &text, 3);
        let mut counts = base.counts.clone();
        reinforce(&mut counts, &text, 3, 5, 1);
        assert!(perplexity(&counts, &text, 3) < before);

        let mut again = base.counts;
        reinforce(&mut again, &text, 3, 5, 1);
        assert_eq!(again, counts);
    }

    #[test]
    fn job_trains_on_synthetic_dialogs_when_nothing_is_uploaded() {
        let tmp = tempfile::tempdir().unwrap();
        let env = JobEnv::new(WorkbenchLayout::new(tmp.path()));
        let sched = JobScheduler::new(InMemoryJobStore::new(), env);
        let rec = sched.run_job("train_sft", json!({"seed": 4, "steps": 2})).unwrap();
        assert_eq!(rec.status, JobStatus::Finished, "{:?}", rec.error);

        let out = rec.result.unwrap();
        assert_eq!(out["run_dir"], "artifacts/chat/sft_4");
        assert_eq!(out["metrics"]["order"], 3);
        assert_eq!(out["metrics"]["items"], 200);
        assert!(out["metrics"]["ppl_base"].as_f64().unwrap() > 1.0);
        assert!(out["metrics"]["ppl_trained"].as_f64().is_some());
        assert_eq!(out["run"]["dataset_hash"].as_str().unwrap().len(), 64);
        assert!(tmp.path().join("artifacts/datasets/wordnet_synth_4.jsonl").is_file());

        let ckpt: serde_json::Value =
            store::load_json(&tmp.path().join("artifacts/chat/sft_4/ckpt_sft_4.json")).unwrap();
        assert_eq!(ckpt["order"], 3);
        assert!(!ckpt["counts"].as_object().unwrap().is_empty());
    }
}
