//! `train_rl`: policy-gradient training of a two-armed bandit.
//!
//! Rewards are a pure function of `(seed, step, arm)`, so a run is
//! reproducible without any stored environment.

use serde_json::{Map, json};

use super::evaluate::round_to;
use super::training::TrainingRun;
use crate::error::JobResult;
use crate::scheduler::{JobContext, JobOutput};

pub const DEFAULT_STEPS: usize = 200;
pub const DEFAULT_LR: f64 = 0.1;
/// Trailing rewards averaged into the run metric.
pub const REWARD_WINDOW: usize = 50;
/// Extra reward of arm 1.
const ARM_BONUS: f64 = 0.5;

/// Hashed reward in `[0, 1)`, plus [`ARM_BONUS`] for arm 1.
pub fn reward(seed: u64, step: u64, arm: u64) -> f64 {
    let h = seed
        .wrapping_mul(1_315_423_911)
        .wrapping_add(step.wrapping_mul(2_654_435_761))
        .wrapping_add(arm.wrapping_mul(97_531))
        & 0xFFFF_FFFF;
    let base = (h % 10_000) as f64 / 10_000.0;
    if arm == 1 { base + ARM_BONUS } else { base }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRun {
    /// Logit of choosing arm 1.
    pub theta: f64,
    pub rewards: Vec<f64>,
}

/// REINFORCE with a moving-average baseline.
///
/// The arm is chosen by a deterministic sweep: arm 1 when `step % 100` falls
/// below `100 * p(arm 1)`.
pub fn train_policy(seed: u64, steps: usize, lr: f64) -> PolicyRun {
    let mut theta = 0.0;
    let mut baseline = 0.0;
    let mut rewards = Vec::with_capacity(steps);
    for t in 0..steps as u64 {
        let p1 = sigmoid(theta);
        let arm = u64::from((t % 100) < (p1 * 100.0) as u64);
        let r = reward(seed, t, arm);
        let grad = if arm == 1 { 1.0 - p1 } else { -p1 };
        theta += lr * (r - baseline) * grad;
        baseline = 0.9 * baseline + 0.1 * r;
        rewards.push(r);
    }
    PolicyRun { theta, rewards }
}

impl PolicyRun {
    pub fn avg_reward_last(&self, n: usize) -> f64 {
        let tail = &self.rewards[self.rewards.len().saturating_sub(n)..];
        if tail.is_empty() {
            return 0.0;
        }
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let steps = ctx.usize_field("steps", DEFAULT_STEPS);
    let lr = ctx.f64_field("lr").filter(|f| f.is_finite()).unwrap_or(DEFAULT_LR);
    let policy = train_policy(ctx.seed, steps, lr);

    let mut metrics = Map::new();
    metrics.insert(
        "avg_reward_last50".into(),
        json!(round_to(policy.avg_reward_last(REWARD_WINDOW), 6)),
    );
    metrics.insert("theta".into(), json!(round_to(policy.theta, 6)));
    metrics.insert("improved".into(), json!(policy.theta > 0.0));

    let checkpoint = json!({ "seed": ctx.seed, "theta": policy.theta });
    TrainingRun::new(ctx, "train_rl", "rl", "ppo").finish(ctx.layout(), &checkpoint, metrics, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobEnv, JobScheduler};
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;
    use workbench_core::WorkbenchLayout;

    #[test]
    fn rewards_are_hashed_from_seed_step_and_arm() {
        assert_eq!(reward(0, 0, 0), 0.0);
        assert!((reward(0, 0, 1) - 1.2531).abs() < 1e-12);
        assert_eq!(reward(42, 17, 0), reward(42, 17, 0));
        for t in 0..100 {
            let r = reward(1337, t, 0);
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn policy_learns_to_prefer_the_better_arm() {
        let run = train_policy(1337, DEFAULT_STEPS, DEFAULT_LR);
        assert!(run.theta > 0.0, "{}", run.theta);
        assert_eq!(run.rewards.len(), DEFAULT_STEPS);
        assert_eq!(train_policy(1337, DEFAULT_STEPS, DEFAULT_LR), run);
        assert_eq!(train_policy(1, 0, DEFAULT_LR).avg_reward_last(REWARD_WINDOW), 0.0);
    }

    #[test]
    fn job_writes_checkpoint_metrics_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let env = JobEnv::new(WorkbenchLayout::new(tmp.path()));
        let sched = JobScheduler::new(InMemoryJobStore::new(), env);
        let rec = sched.run_job("train_rl", json!({"seed": 7, "steps": "120"})).unwrap();
        assert_eq!(rec.status, JobStatus::Finished, "{:?}", rec.error);

        let out = rec.result.unwrap();
        assert_eq!(out["run_dir"], "artifacts/rl/ppo_7");
        assert_eq!(out["metrics"]["job"], "train_rl");
        assert_eq!(out["metrics"]["improved"], true);
        assert_eq!(out["run"]["artifacts"]["ckpt"], "artifacts/rl/ppo_7/ckpt_ppo_7.json");
        assert!(out["run"]["dataset_hash"].is_null());

        let dir = tmp.path().join("artifacts/rl/ppo_7");
        let ckpt: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("ckpt_ppo_7.json")).unwrap()).unwrap();
        assert_eq!(ckpt["seed"], 7);
        assert!(dir.join("metrics.json").is_file());
        assert!(dir.join("run.json").is_file());
    }
}
