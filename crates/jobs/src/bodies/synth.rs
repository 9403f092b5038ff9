//! Synthetic WordNet dialogs: `artifacts/datasets/wordnet_synth_<seed>.jsonl`.

use std::path::PathBuf;

use serde_json::json;

use workbench_core::WorkbenchLayout;
use workbench_runtime::{LexiconIndex, LexiconRecord};

use crate::error::JobResult;

pub const DIALOG_LIMIT: usize = 200;

/// Write the dialog file for `seed` unless it already exists.
///
/// Records are drawn at an even stride across the lexicon index; without an
/// index, placeholder lemmas `word0..` are used.
pub fn ensure_dialogs(layout: &WorkbenchLayout, seed: u64) -> JobResult<PathBuf> {
    let out = layout.synth_dialogs_path(seed);
    if out.exists() {
        return Ok(out);
    }

    let index = LexiconIndex::load(&layout.lexicon_index_path());
    let placeholders: Vec<LexiconRecord>;
    let records: &[LexiconRecord] = if index.is_empty() {
        placeholders = (0..DIALOG_LIMIT as u64)
            .map(|n| LexiconRecord {
                lemma: format!("word{n}"),
                pos: "noun".to_string(),
                offsets: vec![n],
            })
            .collect();
        &placeholders
    } else {
        index.records()
    };

    let n = DIALOG_LIMIT.min(records.len());
    let step = (records.len() / n).max(1);
    let mut body = String::new();
    for k in 0..n {
        let r = &records[(k * step) % records.len()];
        let pos = if r.pos.is_empty() { "?" } else { r.pos.as_str() };
        let offsets = r
            .offsets
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let item = json!({
            "id": format!("wn_{seed}_{k}"),
            "prompt": format!("What does '{}' mean? (POS: {pos})", r.lemma),
            "response": format!("'{}' relates to offsets [{offsets}] in WordNet.", r.lemma),
            "seed": seed,
            "source": "wordnet",
        });
        body.push_str(&item.to_string());
        body.push('\n');
    }

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, body)?;
    tracing::info!(path = %out.display(), items = n, "synthetic dialogs written");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_used_without_an_index() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkbenchLayout::new(tmp.path());
        let path = ensure_dialogs(&layout, 1337).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), DIALOG_LIMIT);
        let first: serde_json::Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
        assert_eq!(first["id"], "wn_1337_0");
        assert_eq!(first["prompt"], "What does 'word0' mean? (POS: noun)");
        assert_eq!(first["response"], "'word0' relates to offsets [0] in WordNet.");
    }

    #[test]
    fn existing_file_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkbenchLayout::new(tmp.path());
        let path = layout.synth_dialogs_path(9);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "keep\n").unwrap();
        ensure_dialogs(&layout, 9).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep\n");
    }

    #[test]
    fn small_index_is_sampled_fully() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkbenchLayout::new(tmp.path());
        std::fs::create_dir_all(layout.indices_dir()).unwrap();
        std::fs::write(
            layout.lexicon_index_path(),
            "{\"lemma\":\"apple\",\"pos\":\"noun\",\"offsets\":[7739125]}\n{\"lemma\":\"run\",\"pos\":\"verb\",\"offsets\":[1926311, 2]}\n",
        )
        .unwrap();
        let body = std::fs::read_to_string(ensure_dialogs(&layout, 1).unwrap()).unwrap();
        assert_eq!(body.lines().count(), 2);
        assert!(body.contains("offsets [1926311, 2]"));
    }
}
