//! `train_cnn` and `train_tsconv`: moving-average forecasters with fitted
//! output weights, trained on the predictor's OHLCV sample.
//!
//! Both fits are least squares over the baseline's own inputs, so the trained
//! forecast is never worse than its baseline on the training series.

use serde_json::{Map, Value, json};

use workbench_core::store;

use super::evaluate::{read_close_series, round_to, synthetic_series};
use super::training::TrainingRun;
use crate::error::JobResult;
use crate::scheduler::{JobContext, JobOutput};

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_SHORT_WINDOW: usize = 3;
pub const DEFAULT_LONG_WINDOW: usize = 12;
const SYNTHETIC_POINTS: usize = 200;
/// Shortest usable sample before falling back to a synthetic series.
const MIN_POINTS: usize = 20;

/// Trailing mean of the `w` previous values; the first `w` slots repeat `y[0]`.
pub fn moving_average(y: &[f64], w: usize) -> Vec<f64> {
    let w = w.max(1);
    (0..y.len())
        .map(|i| {
            if i < w {
                y[0]
            } else {
                y[i - w..i].iter().sum::<f64>() / w as f64
            }
        })
        .collect()
}

/// `(mae, rmse)` of a forecast, skipping the first point.
pub fn errors(pred: &[f64], y: &[f64]) -> (f64, f64) {
    let n = pred.len().min(y.len());
    if n < 2 {
        return (0.0, 0.0);
    }
    let (abs, sq) = (1..n).fold((0.0, 0.0), |(abs, sq), i| {
        let e = y[i] - pred[i];
        (abs + e.abs(), sq + e * e)
    });
    let m = (n - 1) as f64;
    (abs / m, (sq / m).sqrt())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).skip(1).map(|(x, y)| x * y).sum()
}

/// Least-squares gain on a single forecast; 1 when the forecast is all zero.
pub fn fit_scale(pred: &[f64], y: &[f64]) -> f64 {
    let den = dot(pred, pred);
    if den == 0.0 { 1.0 } else { dot(pred, y) / den }
}

/// Least-squares weights `(a, b)` of `a * short + b * long`; an even blend
/// when the inputs are collinear.
pub fn fit_blend(short: &[f64], long: &[f64], y: &[f64]) -> (f64, f64) {
    let (ss, ll, sl) = (dot(short, short), dot(long, long), dot(short, long));
    let (sy, ly) = (dot(short, y), dot(long, y));
    let det = ss * ll - sl * sl;
    if det.abs() <= 1e-12 * (ss * ll).max(1.0) {
        return (0.5, 0.5);
    }
    ((sy * ll - ly * sl) / det, (ly * ss - sy * sl) / det)
}

/// Closing prices of the sample, or a synthetic path, plus the sample's hash.
fn training_series(ctx: &JobContext<'_>) -> JobResult<(Vec<f64>, Option<String>)> {
    let path = ctx.layout().predictor_sample_path();
    let series = read_close_series(&path);
    if series.len() < MIN_POINTS {
        tracing::warn!(path = %path.display(), points = series.len(), "predictor sample too short, using synthetic series");
        return Ok((synthetic_series(SYNTHETIC_POINTS), None));
    }
    Ok((series, Some(store::sha256_file(&path)?)))
}

fn comparison(base: (f64, f64), trained: (f64, f64)) -> Map<String, Value> {
    let mut metrics = Map::new();
    metrics.insert("mae_base".into(), json!(round_to(base.0, 6)));
    metrics.insert("rmse_base".into(), json!(round_to(base.1, 6)));
    metrics.insert("mae_trained".into(), json!(round_to(trained.0, 6)));
    metrics.insert("rmse_trained".into(), json!(round_to(trained.1, 6)));
    // least squares can only tie the baseline up to rounding
    metrics.insert("improved".into(), json!(trained.1 <= base.1 * (1.0 + 1e-9)));
    metrics
}

pub fn run_cnn(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let window = ctx.usize_field("window", DEFAULT_WINDOW).max(1);
    let (y, dataset_hash) = training_series(ctx)?;

    let base = moving_average(&y, window);
    let scale = fit_scale(&base, &y);
    let trained: Vec<f64> = base.iter().map(|p| p * scale).collect();

    let mut metrics = comparison(errors(&base, &y), errors(&trained, &y));
    metrics.insert("window".into(), json!(window));
    metrics.insert("points".into(), json!(y.len()));

    let checkpoint = json!({ "seed": ctx.seed, "window": window, "scale": scale });
    TrainingRun::new(ctx, "train_cnn", "predictor", "cnn").finish(ctx.layout(), &checkpoint, metrics, dataset_hash)
}

pub fn run_tsconv(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let w_short = ctx.usize_field("w_short", DEFAULT_SHORT_WINDOW).max(1);
    let w_long = ctx.usize_field("w_long", DEFAULT_LONG_WINDOW).max(1);
    let (y, dataset_hash) = training_series(ctx)?;

    let short = moving_average(&y, w_short);
    let long = moving_average(&y, w_long);
    let (a, b) = fit_blend(&short, &long, &y);
    let trained: Vec<f64> = short.iter().zip(&long).map(|(s, l)| a * s + b * l).collect();

    let mut metrics = comparison(errors(&long, &y), errors(&trained, &y));
    metrics.insert("w_short".into(), json!(w_short));
    metrics.insert("w_long".into(), json!(w_long));
    metrics.insert("points".into(), json!(y.len()));

    let checkpoint = json!({ "seed": ctx.seed, "w_short": w_short, "w_long": w_long, "a": a, "b": b });
    TrainingRun::new(ctx, "train_tsconv", "predictor", "tsconv").finish(
        ctx.layout(),
        &checkpoint,
        metrics,
        dataset_hash,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobEnv, JobScheduler};
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;
    use workbench_core::WorkbenchLayout;

    fn scheduler() -> (tempfile::TempDir, JobScheduler<InMemoryJobStore>) {
        let tmp = tempfile::tempdir().unwrap();
        let env = JobEnv::new(WorkbenchLayout::new(tmp.path()));
        (tmp, JobScheduler::new(InMemoryJobStore::new(), env))
    }

    #[test]
    fn moving_average_pads_with_the_first_value() {
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.0, 1.0, 1.5, 2.5]);
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn errors_skip_the_first_point() {
        assert_eq!(errors(&[100.0, 1.0, 2.0], &[0.0, 1.0, 4.0]), (1.0, 2f64.sqrt()));
        assert_eq!(errors(&[1.0], &[2.0]), (0.0, 0.0));
    }

    #[test]
    fn fits_recover_exact_relationships() {
        let pred = [9.0, 1.0, 2.0, 3.0];
        let y = [0.0, 2.0, 4.0, 6.0];
        assert!((fit_scale(&pred, &y) - 2.0).abs() < 1e-12);
        assert_eq!(fit_scale(&[0.0; 4], &y), 1.0);

        let short = [0.0, 1.0, 0.0, 1.0, 2.0];
        let long = [0.0, 0.0, 1.0, 1.0, 3.0];
        let y: Vec<f64> = short.iter().zip(&long).map(|(s, l)| 3.0 * s - l).collect();
        let (a, b) = fit_blend(&short, &long, &y);
        assert!((a - 3.0).abs() < 1e-9 && (b + 1.0).abs() < 1e-9, "{a} {b}");
        assert_eq!(fit_blend(&short, &short, &y), (0.5, 0.5));
    }

    #[test]
    fn cnn_job_falls_back_to_synthetic_prices() {
        let (tmp, sched) = scheduler();
        let rec = sched.run_job("train_cnn", json!({"seed": 3})).unwrap();
        assert_eq!(rec.status, JobStatus::Finished, "{:?}", rec.error);
        let out = rec.result.unwrap();
        assert_eq!(out["run_dir"], "artifacts/predictor/cnn_3");
        assert_eq!(out["metrics"]["window"], 5);
        assert_eq!(out["metrics"]["points"], 200);
        assert_eq!(out["metrics"]["improved"], true);
        assert!(out["run"]["dataset_hash"].is_null());
        assert!(tmp.path().join("artifacts/predictor/cnn_3/ckpt_cnn_3.json").is_file());
    }

    #[test]
    fn tsconv_job_hashes_the_sample_it_trains_on() {
        let (tmp, sched) = scheduler();
        let sample = sched.env().layout().predictor_sample_path();
        std::fs::create_dir_all(sample.parent().unwrap()).unwrap();
        let mut body = String::from("date,open,high,low,close,volume\n");
        for i in 0..60 {
            let close = 100.0 + (i as f64 / 3.0).sin() * 5.0 + i as f64 * 0.2;
            body.push_str(&format!("d{i},1,1,1,{close:.4},10\n"));
        }
        std::fs::write(&sample, body).unwrap();

        let rec = sched.run_job("train_tsconv", json!({"seed": 5, "w_long": 10})).unwrap();
        assert_eq!(rec.status, JobStatus::Finished, "{:?}", rec.error);
        let out = rec.result.unwrap();
        assert_eq!(out["metrics"]["w_short"], 3);
        assert_eq!(out["metrics"]["w_long"], 10);
        assert_eq!(out["metrics"]["points"], 60);
        assert_eq!(out["metrics"]["improved"], true);
        assert_eq!(out["run"]["dataset_hash"], store::sha256_file(&sample).unwrap());

        let ckpt: Value =
            store::load_json(&tmp.path().join("artifacts/predictor/tsconv_5/ckpt_tsconv_5.json")).unwrap();
        assert!(ckpt["a"].is_number() && ckpt["b"].is_number());
    }
}
