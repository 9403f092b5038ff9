//! `train_dpo`: preference tuning against a lexical coverage score.
//!
//! A pair's margin is how many more distinct words the chosen answer brings
//! than the rejected one. Training learns an answer suffix that widens it.

use serde_json::{Map, json};

use workbench_core::store;
use workbench_runtime::LexiconIndex;

use super::evaluate::round_to;
use super::self_eval::words;
use super::synth;
use super::training::{self, TrainingRun, read_rows, text_field};
use crate::error::JobResult;
use crate::scheduler::{JobContext, JobOutput};

/// Preference pairs gathered across all sources.
pub const PAIR_LIMIT: usize = 500;
/// Pairs scored for a margin.
pub const SCORED_PAIRS: usize = 200;
pub const TRAINED_SUFFIX: &str = " therefore";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferencePair {
    pub prompt: String,
    pub chosen: String,
    pub rejected: String,
}

impl PreferencePair {
    /// The response is preferred over repeating the prompt back.
    pub fn from_dialog(prompt: String, response: Option<String>) -> Self {
        let mut chosen = response.unwrap_or_else(|| format!("{prompt} is defined."));
        if chosen == prompt {
            chosen = format!("Answer: {chosen}");
        }
        Self {
            rejected: prompt.clone(),
            prompt,
            chosen,
        }
    }

    fn from_lemma(lemma: &str) -> Self {
        Self {
            prompt: format!("define {lemma}"),
            chosen: format!("{lemma} is a term."),
            rejected: lemma.to_string(),
        }
    }
}

/// Distinct alphabetic words of the prompt and answer together.
pub fn coverage(prompt: &str, answer: &str) -> usize {
    words(&format!("{prompt} {answer}")).len()
}

/// Mean chosen-minus-rejected coverage over the first [`SCORED_PAIRS`] pairs,
/// with `suffix` appended to each chosen answer.
pub fn margin(pairs: &[PreferencePair], suffix: &str) -> f64 {
    let scored = &pairs[..pairs.len().min(SCORED_PAIRS)];
    if scored.is_empty() {
        return 0.0;
    }
    let total: i64 = scored
        .iter()
        .map(|p| {
            coverage(&p.prompt, &format!("{}{suffix}", p.chosen)) as i64
                - coverage(&p.prompt, &p.rejected) as i64
        })
        .sum();
    total as f64 / scored.len() as f64
}

fn gather_pairs(ctx: &JobContext<'_>) -> JobResult<(Vec<PreferencePair>, Vec<std::path::PathBuf>)> {
    let mut sources = training::dialog_sources(ctx.layout());
    if sources.is_empty() {
        sources.push(synth::ensure_dialogs(ctx.layout(), ctx.seed)?);
    }
    let mut pairs: Vec<PreferencePair> = sources
        .iter()
        .flat_map(|path| read_rows(path, PAIR_LIMIT))
        .filter_map(|row| {
            let prompt = text_field(&row, &["prompt", "text"])?;
            Some(PreferencePair::from_dialog(prompt, text_field(&row, &["response"])))
        })
        .take(PAIR_LIMIT)
        .collect();
    if pairs.is_empty() {
        let index = LexiconIndex::load(&ctx.layout().lexicon_index_path());
        pairs = index
            .records()
            .iter()
            .take(PAIR_LIMIT)
            .map(|r| PreferencePair::from_lemma(&r.lemma))
            .collect();
    }
    Ok((pairs, sources))
}

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let (pairs, sources) = gather_pairs(ctx)?;
    let base_margin = margin(&pairs, "");
    let trained_margin = margin(&pairs, TRAINED_SUFFIX);

    let mut metrics = Map::new();
    metrics.insert("pairs".into(), json!(pairs.len()));
    metrics.insert("base_margin".into(), json!(round_to(base_margin, 6)));
    metrics.insert("trained_margin".into(), json!(round_to(trained_margin, 6)));
    metrics.insert("improved".into(), json!(trained_margin > base_margin));

    let checkpoint = json!({ "seed": ctx.seed, "suffix": TRAINED_SUFFIX });
    let dataset_hash = store::sha256_files(&sources)?;
    TrainingRun::new(ctx, "train_dpo", "chat", "dpo").finish(ctx.layout(), &checkpoint, metrics, Some(dataset_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobEnv, JobScheduler};
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;
    use workbench_core::WorkbenchLayout;

    fn pair(prompt: &str, chosen: &str, rejected: &str) -> PreferencePair {
        PreferencePair {
            prompt: prompt.into(),
            chosen: chosen.into(),
            rejected: rejected.into(),
        }
    }

    #[test]
    fn pairs_never_prefer_the_prompt_itself() {
        let p = PreferencePair::from_dialog("apple".into(), Some("apple".into()));
        assert_eq!(p.chosen, "Answer: apple");
        assert_eq!(p.rejected, "apple");
        let p = PreferencePair::from_dialog("apple".into(), None);
        assert_eq!(p.chosen, "apple is defined.");
    }

    #[test]
    fn suffix_widens_the_margin() {
        let pairs = [pair("define apple", "apple is a fruit", "define apple")];
        assert_eq!(coverage("define apple", "apple is a fruit"), 5);
        assert_eq!(margin(&pairs, ""), 3.0);
        assert_eq!(margin(&pairs, TRAINED_SUFFIX), 4.0);
        assert_eq!(margin(&[], TRAINED_SUFFIX), 0.0);
    }

    #[test]
    fn upload_pairs_are_scored_and_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkbenchLayout::new(tmp.path());
        std::fs::create_dir_all(layout.uploads_dir()).unwrap();
        std::fs::write(
            layout.uploads_dir().join("prefs.jsonl"),
            "{\"prompt\":\"define bank\",\"response\":\"a bank holds money\"}\n{\"text\":\"river\"}\n",
        )
        .unwrap();
        let sched = JobScheduler::new(InMemoryJobStore::new(), JobEnv::new(layout));
        let rec = sched.run_job("train_dpo", json!({"seed": 9})).unwrap();
        assert_eq!(rec.status, JobStatus::Finished, "{:?}", rec.error);

        let out = rec.result.unwrap();
        assert_eq!(out["metrics"]["pairs"], 2);
        assert_eq!(out["metrics"]["improved"], true);
        assert_eq!(out["run_dir"], "artifacts/chat/dpo_9");
        let ckpt: serde_json::Value =
            store::load_json(&tmp.path().join("artifacts/chat/dpo_9/ckpt_dpo_9.json")).unwrap();
        assert_eq!(ckpt["suffix"], " therefore");
    }
}
