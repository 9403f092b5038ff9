//! `evaluate`: synthesize dialogs, or score a chat or predictor model into
//! `artifacts/metrics/<capability>/<model_id>.json`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use serde_json::{Map, Value, json};

use workbench_core::csv;
use workbench_registry::ModelEntry;

use super::{CHAT_MODULE_ID, LEXICON_MODULE_ID, PREDICTOR_MODULE_ID, default_model_id, synth};
use crate::error::{JobError, JobResult};
use crate::scheduler::{JobContext, JobOutput};

/// Prompts scored per chat evaluation.
pub const CHAT_EVAL_PROMPTS: usize = 100;
pub const DEFAULT_WINDOW: usize = 5;
/// Length of the fallback price series.
const SYNTHETIC_POINTS: usize = 200;
const CLOSE_COLUMNS: [&str; 4] = ["close", "closing", "adj_close", "adj close"];

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let module_id = ctx.require_module()?.to_string();
    let model_id = ctx
        .str_field("model_id")
        .map(str::to_string)
        .or_else(|| default_model_id(&module_id, ctx.seed, None));

    let mut out = match (module_id.as_str(), model_id) {
        (LEXICON_MODULE_ID, _) => {
            let path = synth::ensure_dialogs(ctx.layout(), ctx.seed)?;
            let mut out = JobOutput::new();
            out.insert("dataset".into(), json!(ctx.layout().relativize(&path)));
            out
        }
        (CHAT_MODULE_ID, Some(model_id)) => evaluate_chat(ctx, &model_id)?,
        (PREDICTOR_MODULE_ID, Some(model_id)) => evaluate_predictor(ctx, &model_id)?,
        (other, _) => return Err(JobError::UnknownModule(other.to_string())),
    };
    out.insert("module_id".into(), json!(module_id));
    out.insert("seed".into(), json!(ctx.seed));
    out.insert("status".into(), json!("ok"));
    Ok(out)
}

/// Nearest-rank percentile over sorted samples.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = ((q / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[k.min(sorted.len() - 1)]
}

pub fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round() / scale
}

fn model_provenance(ctx: &JobContext<'_>, model_id: &str) -> Option<ModelEntry> {
    ctx.registry().models().get(model_id).ok().flatten()
}

fn evaluate_chat(ctx: &mut JobContext<'_>, model_id: &str) -> JobResult<JobOutput> {
    let dialogs = synth::ensure_dialogs(ctx.layout(), ctx.seed)?;
    let mut prompts = read_prompts(&dialogs, CHAT_EVAL_PROMPTS)?;
    if prompts.is_empty() {
        prompts.push("What does 'example' mean?".to_string());
    }

    let chat = ctx.env.chat();
    let lexicon = chat.lexicon();
    let mut latencies = Vec::with_capacity(prompts.len());
    let mut hits = 0usize;
    for prompt in &prompts {
        let started = Instant::now();
        let lemma = chat.extract_lemma(prompt);
        let grounded = lemma.as_deref().is_some_and(|l| lexicon.find(l).is_some());
        latencies.push(started.elapsed().as_secs_f64() * 1000.0);
        if grounded {
            hits += 1;
        }
    }
    latencies.sort_by(f64::total_cmp);
    let hit_rate = hits as f64 / prompts.len().max(1) as f64;

    let lm = chat.ngram().stats();
    let entry = model_provenance(ctx, model_id);
    let mut doc = Map::new();
    doc.insert("model_id".into(), json!(model_id));
    doc.insert("seed".into(), json!(ctx.seed));
    doc.insert("model_train_seed".into(), json!(entry.as_ref().and_then(|e| e.train_seed)));
    doc.insert("nn_id".into(), json!(entry.as_ref().and_then(|e| e.nn_id.clone())));
    doc.insert(
        "latency_ms".into(),
        json!({
            "p50": round_to(percentile(&latencies, 50.0), 3),
            "p95": round_to(percentile(&latencies, 95.0), 3),
        }),
    );
    doc.insert("grounding_hit_rate".into(), json!(round_to(hit_rate, 3)));
    doc.insert("lm".into(), serde_json::to_value(lm).unwrap_or(Value::Null));

    let doc = ctx.registry().metrics().record("chat", model_id, doc)?;
    tracing::info!(%model_id, prompts = prompts.len(), hits, "chat model evaluated");
    Ok(doc)
}

fn read_prompts(path: &Path, limit: usize) -> JobResult<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader
        .lines()
        .take(limit)
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<Value>(&line).ok())
        .map(|obj| obj.get("prompt").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect())
}

/// Closing prices from an OHLCV csv. A missing file is an empty series.
pub fn read_close_series(path: &Path) -> Vec<f64> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let mut lines = BufReader::new(file).lines().map_while(Result::ok);
    let close_idx = lines.next().and_then(|header| {
        csv::split_record(&header)
            .iter()
            .position(|name| CLOSE_COLUMNS.contains(&name.to_lowercase().as_str()))
    });
    lines
        .filter(|row| !row.trim().is_empty())
        .filter_map(|row| {
            let mut cells = csv::split_record(&row);
            let cell = match close_idx {
                Some(i) if i < cells.len() => cells.swap_remove(i),
                Some(_) => return None,
                None => cells.pop()?,
            };
            cell.parse::<f64>().ok()
        })
        .collect()
}

/// Smooth deterministic price path used when no sample is available.
pub fn synthetic_series(points: usize) -> Vec<f64> {
    let mut y = Vec::with_capacity(points);
    y.push(100.0);
    for i in 1..points {
        let prev = y[i - 1];
        y.push(prev * (1.0 + 0.01 * (i as f64 / 5.0).sin()));
    }
    y
}

/// Forecast errors of a trailing moving average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastErrors {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub n: usize,
}

pub fn moving_average_errors(series: &[f64], window: usize) -> ForecastErrors {
    let window = window.max(1);
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut n = 0usize;
    for t in window..series.len() {
        let pred = series[t - window..t].iter().sum::<f64>() / window as f64;
        let err = series[t] - pred;
        abs_sum += err.abs();
        sq_sum += err * err;
        pct_sum += err.abs() / pred.abs().max(1e-9);
        n += 1;
    }
    let denom = n.max(1) as f64;
    ForecastErrors {
        mae: abs_sum / denom,
        rmse: (sq_sum / denom).sqrt(),
        mape: pct_sum / denom,
        n,
    }
}

fn evaluate_predictor(ctx: &mut JobContext<'_>, model_id: &str) -> JobResult<JobOutput> {
    let entry = model_provenance(ctx, model_id);
    let window = entry
        .as_ref()
        .and_then(|e| e.extra.get("window"))
        .and_then(Value::as_u64)
        .map(|w| w as usize)
        .filter(|w| *w > 0)
        .unwrap_or(DEFAULT_WINDOW);

    let mut series = read_close_series(&ctx.layout().predictor_sample_path());
    if series.len() < window + 10 {
        series = synthetic_series(SYNTHETIC_POINTS);
    }
    let errors = moving_average_errors(&series, window);

    let mut doc = Map::new();
    doc.insert("model_id".into(), json!(model_id));
    doc.insert("seed".into(), json!(ctx.seed));
    doc.insert("model_train_seed".into(), json!(entry.as_ref().and_then(|e| e.train_seed)));
    doc.insert("nn_id".into(), json!(entry.as_ref().and_then(|e| e.nn_id.clone())));
    doc.insert("window".into(), json!(window));
    doc.insert("mae".into(), json!(round_to(errors.mae, 6)));
    doc.insert("rmse".into(), json!(round_to(errors.rmse, 6)));
    doc.insert("mape".into(), json!(round_to(errors.mape, 6)));
    doc.insert("n".into(), json!(errors.n));

    let doc = ctx.registry().metrics().record("predictor", model_id, doc)?;
    tracing::info!(%model_id, window, n = errors.n, "predictor evaluated");
    Ok(doc)
}
