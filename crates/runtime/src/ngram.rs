//! Character n-gram model used for offline continuations.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use workbench_core::rng::DEFAULT_SEED;
use workbench_core::{WorkbenchLayout, store};

pub const DEFAULT_ORDER: usize = 3;
/// Contexts kept when a model is persisted.
pub const MAX_CONTEXTS: usize = 20_000;
/// Lines read from each corpus source.
pub const LINES_PER_SOURCE: usize = 2_000;

/// Context string to next-character counts.
pub type Counts = BTreeMap<String, BTreeMap<String, u64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramModel {
    pub order: usize,
    #[serde(default)]
    pub counts: Counts,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub built_from: Option<String>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NgramStats {
    pub order: usize,
    pub contexts: usize,
    pub total_transitions: u64,
}

impl NgramModel {
    pub fn empty(order: usize) -> Self {
        Self {
            order: order.max(1),
            counts: Counts::new(),
            seed: DEFAULT_SEED,
            built_from: None,
        }
    }

    /// Count every `order`-character context and the character that follows it.
    pub fn build(corpus: &str, order: usize, seed: u64) -> Self {
        let order = order.max(1);
        let chars: Vec<char> = corpus.chars().collect();
        let mut counts = Counts::new();
        for window in chars.windows(order + 1) {
            let ctx: String = window[..order].iter().collect();
            *counts
                .entry(ctx)
                .or_default()
                .entry(window[order].to_string())
                .or_insert(0) += 1;
        }
        Self {
            order,
            counts,
            seed,
            built_from: None,
        }
    }

    pub fn with_source(mut self, built_from: Option<String>) -> Self {
        self.built_from = built_from;
        self
    }

    /// Keep only the first `max` contexts in key order.
    pub fn capped(mut self, max: usize) -> Self {
        if self.counts.len() > max {
            self.counts = std::mem::take(&mut self.counts).into_iter().take(max).collect();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn stats(&self) -> NgramStats {
        NgramStats {
            order: self.order,
            contexts: self.counts.len(),
            total_transitions: self.counts.values().flat_map(|b| b.values()).sum(),
        }
    }

    /// Extend `seed_text` by up to `steps` sampled characters.
    ///
    /// The context starts as the last `order` characters of the seed (space
    /// padded). On a miss the oldest context character is dropped, then an
    /// all-space context is tried; a second miss ends generation.
    pub fn generate(&self, seed_text: &str, steps: usize, rng: &mut StdRng) -> String {
        let order = self.order.max(1);
        let mut out = seed_text.to_string();
        let padded: Vec<char> = " ".repeat(order).chars().chain(seed_text.chars()).collect();
        let mut ctx: String = padded[padded.len() - order..].iter().collect();

        for _ in 0..steps {
            let bucket = match self.counts.get(&ctx) {
                Some(b) => b,
                None => {
                    ctx = ctx.chars().skip(1).collect();
                    if ctx.is_empty() {
                        ctx = " ".repeat(order);
                    }
                    match self.counts.get(&ctx) {
                        Some(b) => b,
                        None => break,
                    }
                }
            };
            let Some(next) = sample(bucket, rng) else {
                break;
            };
            out.push_str(&next);
            ctx.push_str(&next);
            let extra = ctx.chars().count().saturating_sub(order);
            ctx = ctx.chars().skip(extra).collect();
        }
        out
    }
}

/// Weighted draw over `(count, char)`-sorted entries.
pub(crate) fn sample(bucket: &BTreeMap<String, u64>, rng: &mut StdRng) -> Option<String> {
    let mut items: Vec<(&String, u64)> = bucket.iter().map(|(c, n)| (c, *n)).collect();
    items.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
    let total: u64 = items.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return None;
    }
    let target = rng.gen_range(1..=total);
    let mut acc = 0;
    for (ch, n) in &items {
        acc += n;
        if target <= acc {
            return Some((*ch).clone());
        }
    }
    items.last().map(|(c, _)| (*c).clone())
}

/// Text gathered from the local chat datasets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub text: String,
    pub built_from: Option<String>,
}

/// Concatenate `response` and `prompt` (or `text`) of the first lines of every
/// synthetic dialog file and every upload.
pub fn gather_corpus(layout: &WorkbenchLayout) -> Corpus {
    let mut sources: Vec<_> = store::files_with_extension(&layout.datasets_dir(), "jsonl")
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("wordnet_synth_"))
        })
        .collect();
    sources.extend(store::files_with_extension(&layout.uploads_dir(), "jsonl"));
    if sources.is_empty() {
        return Corpus::default();
    }

    let names: Vec<String> = sources
        .iter()
        .take(3)
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    let mut built_from = names.join(",");
    if sources.len() > 3 {
        built_from.push('+');
    }

    let mut text = String::new();
    for path in &sources {
        append_source(path, &mut text);
    }
    Corpus {
        text,
        built_from: Some(built_from),
    }
}

fn append_source(path: &Path, text: &mut String) {
    let Ok(file) = File::open(path) else {
        tracing::warn!(path = %path.display(), "corpus source unreadable");
        return;
    };
    for line in BufReader::new(file).lines().take(LINES_PER_SOURCE).map_while(Result::ok) {
        let obj: Value =
            serde_json::from_str(&line).unwrap_or_else(|_| serde_json::json!({ "text": line.trim() }));
        let field = |key: &str| -> Option<String> {
            obj.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        };
        text.push_str(&field("response").unwrap_or_default());
        text.push('\n');
        text.push_str(&field("prompt").or_else(|| field("text")).unwrap_or_default());
        text.push('\n');
    }
}
