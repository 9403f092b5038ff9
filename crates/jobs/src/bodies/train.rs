//! `train`: build the lexicon index, the chat n-gram model, or a
//! moving-average predictor checkpoint.

use serde_json::{Value, json};

use workbench_registry::ModelEntry;
use workbench_runtime::lexicon;
use workbench_runtime::ngram::{self, NgramModel};

use workbench_core::store;

use super::{CHAT_MODULE_ID, LEXICON_MODULE_ID, PREDICTOR_MODULE_ID, default_model_id};
use crate::error::{JobError, JobResult};
use crate::scheduler::{JobContext, JobOutput};

/// Corpus used when no dataset text exists yet.
const FALLBACK_CORPUS: &str = "hello world ";
const FALLBACK_REPEAT: usize = 100;
const VISION_FAMILIES: [&str; 5] = [
    "vision",
    "vision_edge",
    "vision_detection",
    "vision_segmentation",
    "vision_transformer",
];

pub fn run(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let module_id = ctx.require_module()?.to_string();
    let mut out = match module_id.as_str() {
        LEXICON_MODULE_ID => train_lexicon(ctx)?,
        CHAT_MODULE_ID => train_chat(ctx)?,
        PREDICTOR_MODULE_ID => train_predictor(ctx)?,
        other => return Err(JobError::UnknownModule(other.to_string())),
    };
    out.insert("module_id".into(), json!(module_id));
    out.insert("seed".into(), json!(ctx.seed));
    out.insert("status".into(), json!("ok"));
    Ok(out)
}

/// N-gram order for a neural-net family.
pub fn ngram_order(family: Option<&str>) -> usize {
    match family {
        Some("feedforward") => 2,
        Some("nlp_transformer") => 4,
        _ => ngram::DEFAULT_ORDER,
    }
}

/// Moving-average window for a neural-net family.
pub fn predictor_window(family: Option<&str>) -> usize {
    match family {
        Some(f) if VISION_FAMILIES.contains(&f) => 3,
        Some("rl" | "graph") => 7,
        _ => 5,
    }
}

fn train_lexicon(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let layout = ctx.layout();
    let path = layout.lexicon_index_path();
    let records = lexicon::build_index(&layout.wordnet_dict_dir(), &path)?;
    ctx.env.chat().reset_caches();

    let mut out = JobOutput::new();
    out.insert("index".into(), json!(layout.relativize(&path)));
    out.insert("records".into(), json!(records));
    Ok(out)
}

fn train_chat(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let layout = ctx.layout();
    let nn_id = ctx.str_field("nn_id").map(str::to_string);
    let family = nn_id
        .as_deref()
        .and_then(|id| ctx.registry().neural_nets().family_of(id));
    let order = ngram_order(family.as_deref());

    let corpus = ngram::gather_corpus(layout);
    let text = if corpus.text.is_empty() {
        FALLBACK_CORPUS.repeat(FALLBACK_REPEAT)
    } else {
        corpus.text
    };
    let model = NgramModel::build(&text, order, ctx.seed)
        .with_source(corpus.built_from)
        .capped(ngram::MAX_CONTEXTS);
    let lm_path = layout.ngram_path();
    store::save_json(&lm_path, &model)?;
    ctx.env.chat().reset_caches();

    let model_id = default_model_id(CHAT_MODULE_ID, ctx.seed, nn_id.as_deref())
        .unwrap_or_else(|| format!("chat_retrieval_{}", ctx.seed));
    let mut entry = ModelEntry::new(&model_id, &model_id);
    entry.capability = Some("chat".into());
    entry.task = Some("dialogue".into());
    entry.nn_id = nn_id;
    entry.train_seed = Some(ctx.seed);
    entry.mode = Some("retrieval+ngram".into());
    entry.extra.insert("lm_path".into(), json!(layout.relativize(&lm_path)));
    entry.extra.insert("order".into(), json!(order));
    let entry = ctx.registry().models().create(entry)?;

    tracing::info!(model_id = %entry.id, order, contexts = model.counts.len(), "chat model trained");
    let mut out = JobOutput::new();
    out.insert("model_id".into(), json!(entry.id));
    out.insert(
        "registry".into(),
        json!(layout.relativize(&ctx.registry().models().dir().join(format!("{}.json", entry.id)))),
    );
    out.insert("lm".into(), json!(layout.relativize(&lm_path)));
    out.insert("order".into(), json!(order));
    Ok(out)
}

fn train_predictor(ctx: &mut JobContext<'_>) -> JobResult<JobOutput> {
    let layout = ctx.layout();
    let nn_id = ctx.str_field("nn_id").map(str::to_string);
    let family = nn_id
        .as_deref()
        .and_then(|id| ctx.registry().neural_nets().family_of(id));
    let window = predictor_window(family.as_deref());

    let model_id = default_model_id(PREDICTOR_MODULE_ID, ctx.seed, nn_id.as_deref())
        .unwrap_or_else(|| format!("predictor_ma_{}", ctx.seed));
    let checkpoint = layout.predictor_checkpoint_dir().join(format!("{model_id}.json"));
    store::save_json(
        &checkpoint,
        &json!({
            "type": "moving_average",
            "window": window,
            "seed": ctx.seed,
            "nn_id": nn_id,
        }),
    )?;

    let mut entry = ModelEntry::new(&model_id, &model_id);
    entry.capability = Some("predictor".into());
    entry.task = Some("forecast".into());
    entry.nn_id = nn_id;
    entry.train_seed = Some(ctx.seed);
    entry.extra.insert("checkpoint".into(), json!(layout.relativize(&checkpoint)));
    entry.extra.insert("window".into(), json!(window));
    let entry = ctx.registry().models().create(entry)?;

    tracing::info!(model_id = %entry.id, window, "predictor trained");
    let mut out = JobOutput::new();
    out.insert("model_id".into(), Value::String(entry.id.clone()));
    out.insert(
        "registry".into(),
        json!(layout.relativize(&ctx.registry().models().dir().join(format!("{}.json", entry.id)))),
    );
    out.insert("window".into(), json!(window));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobEnv, JobScheduler};
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;
    use workbench_core::WorkbenchLayout;
    use workbench_registry::NeuralNetSpec;

    fn scheduler() -> (tempfile::TempDir, JobScheduler<InMemoryJobStore>) {
        let tmp = tempfile::tempdir().unwrap();
        let env = JobEnv::new(WorkbenchLayout::new(tmp.path()));
        (tmp, JobScheduler::new(InMemoryJobStore::new(), env))
    }

    #[test]
    fn family_selects_order_and_window() {
        assert_eq!(ngram_order(Some("feedforward")), 2);
        assert_eq!(ngram_order(Some("nlp_transformer")), 4);
        assert_eq!(ngram_order(None), 3);
        assert_eq!(predictor_window(Some("vision_edge")), 3);
        assert_eq!(predictor_window(Some("graph")), 7);
        assert_eq!(predictor_window(Some("nlp")), 5);
        assert_eq!(predictor_window(None), 5);
    }

    #[test]
    fn chat_training_registers_retrieval_model() {
        let (tmp, sched) = scheduler();
        let rec = sched
            .run_job("train", json!({"module_id": "chat-core", "seed": 7}))
            .unwrap();
        assert_eq!(rec.status, JobStatus::Finished, "{:?}", rec.error);
        let result = rec.result.unwrap();
        assert_eq!(result["model_id"], "chat_retrieval_7");
        assert_eq!(result["status"], "ok");
        assert_eq!(result["order"], 3);

        let entry = sched.env().registry().models().get("chat_retrieval_7").unwrap().unwrap();
        assert!(entry.is_retrieval());
        assert_eq!(entry.train_seed, Some(7));
        assert!(tmp.path().join("artifacts/chat/lm_ngram.json").is_file());
    }

    #[test]
    fn predictor_training_uses_net_family() {
        let (tmp, sched) = scheduler();
        sched
            .env()
            .registry()
            .neural_nets()
            .create(NeuralNetSpec {
                id: "nn_cnn".into(),
                family: Some("vision".into()),
                ..NeuralNetSpec::default()
            })
            .unwrap();

        let rec = sched
            .run_job("train", json!({"module_id": "predictor-finance", "nn_id": "nn_cnn"}))
            .unwrap();
        let result = rec.result.unwrap();
        assert_eq!(result["model_id"], "predictor_nn_cnn_1337");
        assert_eq!(result["window"], 3);

        let ckpt = tmp.path().join("modules/predictor-finance/models/predictor_nn_cnn_1337.json");
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(ckpt).unwrap()).unwrap();
        assert_eq!(doc["type"], "moving_average");
        assert_eq!(doc["nn_id"], "nn_cnn");
    }

    #[test]
    fn lexicon_training_builds_index() {
        let (tmp, sched) = scheduler();
        let dict = tmp.path().join("WordNet-3.0/dict");
        std::fs::create_dir_all(&dict).unwrap();
        std::fs::write(dict.join("index.noun"), "apple n 1 1 @ 1 0 07739125\n").unwrap();

        let rec = sched.run_job("train", json!({"module_id": "lexicon-wordnet3"})).unwrap();
        let result = rec.result.unwrap();
        assert_eq!(result["records"], 1);
        assert_eq!(result["index"], "artifacts/indices/wordnet-lexicon.jsonl");
    }

    #[test]
    fn unknown_module_fails() {
        let (_tmp, sched) = scheduler();
        let rec = sched.run_job("train", json!({"module_id": "nope"})).unwrap();
        assert_eq!(rec.status, JobStatus::Failed);
        assert_eq!(rec.error.as_deref(), Some("unknown module_id: nope"));
    }
}
