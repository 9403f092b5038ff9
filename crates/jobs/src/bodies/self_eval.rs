//! `self_eval`: lexical grounding score of prompt/response pairs.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use workbench_core::{store, time};

use crate::error::{JobError, JobResult};
use crate::scheduler::{JobContext, JobOutput};

/// Scores below this are rewritten when `rewrite` is set.
pub const REWRITE_THRESHOLD: f64 = 0.5;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfEvalItem {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub prompt: String,
    pub response: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite_reason: Option<String>,
}

pub(crate) fn words(text: &str) -> BTreeSet<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard similarity of the alphabetic words of `a` and `b`.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let (ta, tb) = (words(a), words(b));
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union.max(1) as f64
}

fn default_items() -> Vec<SelfEvalItem> {
    vec![
        SelfEvalItem {
            prompt: "define apple".into(),
            response: "apple is a fruit".into(),
        },
        SelfEvalItem {
            prompt: "what is run".into(),
            response: "run means to move fast".into(),
        },
    ]
}

pub fn score_items(items: Vec<SelfEvalItem>, rewrite: bool) -> Vec<ScoredItem> {
    items
        .into_iter()
        .map(|item| {
            let score = jaccard(&item.prompt, &item.response);
            let low = rewrite && score < REWRITE_THRESHOLD;
            ScoredItem {
                rewritten: low.then(|| format!("Answer: {}", item.response)),
                rewrite_reason: low.then(|| "low lexical grounding".to_string()),
                prompt: item.prompt,
                response: item.response,
                score,
            }
        })
        .collect()
}

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let items: Vec<SelfEvalItem> = match ctx.payload.get("items") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| JobError::InvalidPayload(format!("items: {e}")))?,
    };
    let items = if items.is_empty() { default_items() } else { items };
    let scored = score_items(items, ctx.bool_field("rewrite"));

    let path = ctx.layout().chat_dir().join(format!("self_eval_{}.json", ctx.seed));
    store::save_json(&path, &json!({ "created_at": time::now_iso(), "items": scored }))?;
    tracing::info!(count = scored.len(), path = %path.display(), "self evaluation written");

    let mut out = JobOutput::new();
    out.insert("status".into(), json!("ok"));
    out.insert("self_eval".into(), json!(ctx.layout().relativize(&path)));
    out.insert("count".into(), json!(scored.len()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobEnv, JobScheduler};
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;
    use workbench_core::WorkbenchLayout;

    #[test]
    fn jaccard_edges() {
        assert_eq!(jaccard("", ""), 1.0);
        assert_eq!(jaccard("apple", ""), 0.0);
        assert_eq!(jaccard("Apple pie", "apple PIE!"), 1.0);
        assert_eq!(jaccard("define apple", "apple is a fruit"), 0.2);
    }

    #[test]
    fn low_scores_are_rewritten_on_request() {
        let scored = score_items(default_items(), true);
        assert_eq!(scored[0].rewritten.as_deref(), Some("Answer: apple is a fruit"));
        assert!(score_items(default_items(), false).iter().all(|s| s.rewritten.is_none()));
    }

    #[test]
    fn writes_artifact_for_seed() {
        let tmp = tempfile::tempdir().unwrap();
        let sched = JobScheduler::new(InMemoryJobStore::new(), JobEnv::new(WorkbenchLayout::new(tmp.path())));
        let rec = sched
            .run_job(
                "self_eval",
                json!({"seed": 11, "items": [{"prompt": "a b", "response": "a b"}]}),
            )
            .unwrap();
        let result = rec.result.unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["self_eval"], "artifacts/chat/self_eval_11.json");
        let doc: Value = serde_json::from_str(
            &std::fs::read_to_string(tmp.path().join("artifacts/chat/self_eval_11.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(doc["items"][0]["score"], 1.0);
    }

    #[test]
    fn malformed_items_fail_the_job() {
        let tmp = tempfile::tempdir().unwrap();
        let sched = JobScheduler::new(InMemoryJobStore::new(), JobEnv::new(WorkbenchLayout::new(tmp.path())));
        let rec = sched.run_job("self_eval", json!({"items": "nope"})).unwrap();
        assert_eq!(rec.status, JobStatus::Failed);
        assert!(rec.error.unwrap().starts_with("invalid payload: items"));
    }
}
