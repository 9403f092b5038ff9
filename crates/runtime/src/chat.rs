//! Grounded-or-fallback chat answers.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use regex::Regex;
use serde::Serialize;

use workbench_core::WorkbenchLayout;
use workbench_core::store;
use workbench_registry::GuardrailPolicy;

use crate::babble::{self, BabbleModel};
use crate::cache::MtimeCache;
use crate::counters::ObservationCounters;
use crate::error::RuntimeResult;
use crate::guardrails::{self, GuardedText, GuardrailAction};
use crate::lexicon::{LexiconIndex, LexiconRecord};
use crate::ngram::{self, NgramModel};
use crate::wordnet::{GlossCache, Synset};

/// Characters sampled for a fallback continuation.
pub const CONTINUATION_STEPS: usize = 48;
pub const ECHO_PREFIX: &str = "Answer: ";
pub const UNKNOWN_LEMMA: &str = "unknown";
/// Index lemmas used as a corpus when no dataset text exists.
const LEMMA_CORPUS_LIMIT: usize = 5_000;

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']+)'").expect("valid regex"));
static ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("valid regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("valid regex"));

/// Lowercase and strip non-word characters; used to detect echoed input.
pub fn normalize(text: &str) -> String {
    NON_WORD.replace_all(&text.to_lowercase(), "").into_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LmUsage {
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

/// How an answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerMeta {
    pub lemma: String,
    pub pos: Option<String>,
    pub offsets: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub lm: LmUsage,
}

impl AnswerMeta {
    pub fn is_grounded(&self) -> bool {
        !self.lm.used
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub raw: String,
    pub guarded: GuardedText,
    pub meta: AnswerMeta,
}

/// Response to one chat turn: the guarded input and the guarded answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub processed: GuardedText,
    pub answer: ChatAnswer,
}

pub struct ChatRuntime {
    layout: WorkbenchLayout,
    lexicon: MtimeCache<LexiconIndex>,
    ngram: MtimeCache<NgramModel>,
    babble: MtimeCache<BabbleModel>,
    glosses: GlossCache,
    counters: ObservationCounters,
}

impl ChatRuntime {
    pub fn new(layout: WorkbenchLayout) -> Self {
        Self {
            lexicon: MtimeCache::new(layout.lexicon_index_path()),
            ngram: MtimeCache::new(layout.ngram_path()),
            babble: MtimeCache::new(layout.babble_model_path()),
            glosses: GlossCache::new(layout.wordnet_dict_dir()),
            counters: ObservationCounters::new(layout.counts_path()),
            layout,
        }
    }

    pub fn counters(&self) -> &ObservationCounters {
        &self.counters
    }

    pub fn lexicon(&self) -> Arc<LexiconIndex> {
        self.lexicon.get_or_load(LexiconIndex::load)
    }

    /// The persisted model, or one built from the local corpus and persisted.
    pub fn ngram(&self) -> Arc<NgramModel> {
        self.ngram.get_or_load(|path| self.load_or_build_ngram(path))
    }

    /// Bigram babble model, built and persisted on first use.
    pub fn babble(&self) -> Arc<BabbleModel> {
        self.babble.get_or_load(|path| self.load_or_build_babble(path))
    }

    pub fn reset_caches(&self) {
        self.lexicon.reset();
        self.ngram.reset();
        self.babble.reset();
        self.glosses.reset();
    }

    /// Pick the lemma a message is about.
    pub fn extract_lemma(&self, text: &str) -> Option<String> {
        if let Some(m) = QUOTED.captures(text).and_then(|c| c.get(1)) {
            return Some(m.as_str().trim().to_lowercase());
        }
        let index = self.lexicon();
        if index.is_empty() {
            return None;
        }
        ALPHA
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .find(|tok| index.contains(tok))
            .or_else(|| self.counters.most_seen())
    }

    /// Answer from a WordNet gloss when one resolves, else an n-gram continuation.
    pub fn generate_answer(&self, text: &str, rng: &mut StdRng) -> RuntimeResult<(String, AnswerMeta)> {
        let lemma = self
            .extract_lemma(text)
            .unwrap_or_else(|| UNKNOWN_LEMMA.to_string());
        let index = self.lexicon();
        let record = index.find(&lemma);

        if let Some(rec) = record {
            if let Some((offset, synset)) = rec
                .primary_offset()
                .and_then(|off| self.glosses.lookup(&rec.pos, off).map(|s| (off, s)))
            {
                let count = self.counters.increment(&lemma)?;
                let answer = grounded_answer(&lemma, rec, offset, &synset);
                let meta = AnswerMeta {
                    lemma,
                    pos: Some(rec.pos.clone()),
                    offsets: rec.offsets.clone(),
                    chosen_offset: Some(offset),
                    count: Some(count),
                    lm: LmUsage { used: false, order: None },
                };
                return Ok((answer, meta));
            }
        }

        let model = self.ngram();
        let (continuation, order) = if model.is_empty() {
            let babble = self.babble();
            let text = format!("{lemma} {}", babble.babble(&lemma, CONTINUATION_STEPS, rng));
            (text, babble.order)
        } else {
            (model.generate(&format!("{lemma} — "), CONTINUATION_STEPS, rng), model.order)
        };
        let answer = format!(
            "No exact WordNet gloss was found for '{lemma}'. Local continuation: {}",
            continuation.trim()
        );
        let meta = AnswerMeta {
            pos: record.map(|r| r.pos.clone()),
            offsets: record.map(|r| r.offsets.clone()).unwrap_or_default(),
            lemma,
            chosen_offset: None,
            count: None,
            lm: LmUsage { used: true, order: Some(order) },
        };
        Ok((answer, meta))
    }

    /// Full chat turn: guard the input, answer, guard the answer, never echo.
    pub fn respond(&self, text: &str, policy: &GuardrailPolicy, rng: &mut StdRng) -> RuntimeResult<ChatReply> {
        let processed = guardrails::apply(text, policy);
        let input_norm = normalize(text);

        let (mut raw, meta) = self.generate_answer(text, rng)?;
        if normalize(&raw) == input_norm {
            raw = format!("{ECHO_PREFIX}{raw}");
        }

        let mut guarded = guardrails::apply(&raw, policy);
        if normalize(&guarded.result) == input_norm {
            guarded.result = format!("{ECHO_PREFIX}{}", guarded.result);
            guarded.actions.push(GuardrailAction::AntiEcho {
                reason: "output matched input".to_string(),
            });
        }

        tracing::debug!(lemma = %meta.lemma, grounded = meta.is_grounded(), "chat answered");
        Ok(ChatReply {
            processed,
            answer: ChatAnswer { raw, guarded, meta },
        })
    }

    fn load_or_build_ngram(&self, path: &std::path::Path) -> NgramModel {
        match store::load_json_opt::<NgramModel>(path) {
            Ok(Some(model)) if !model.is_empty() => return model,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "n-gram model unreadable, rebuilding"),
        }

        let corpus = ngram::gather_corpus(&self.layout);
        let text = if corpus.text.is_empty() {
            self.lemma_corpus()
        } else {
            corpus.text
        };
        let model = NgramModel::build(&text, ngram::DEFAULT_ORDER, workbench_core::rng::DEFAULT_SEED)
            .with_source(corpus.built_from)
            .capped(ngram::MAX_CONTEXTS);
        if !model.is_empty() {
            if let Err(e) = store::save_json(path, &model) {
                tracing::warn!(error = %e, "could not persist n-gram model");
            }
        }
        model
    }

    fn load_or_build_babble(&self, path: &std::path::Path) -> BabbleModel {
        match store::load_json_opt::<BabbleModel>(path) {
            Ok(Some(model)) if !model.is_empty() => return model,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "babble model unreadable, rebuilding"),
        }

        let corpus = ngram::gather_corpus(&self.layout);
        let (text, built_from) = if !corpus.text.trim().is_empty() {
            (corpus.text, corpus.built_from)
        } else {
            let lemmas = self.lemma_corpus();
            if lemmas.is_empty() {
                (babble::alphabet_corpus(), Some("alphabet".to_string()))
            } else {
                (lemmas, Some("lexicon".to_string()))
            }
        };
        let model = BabbleModel::build(&text, workbench_core::rng::DEFAULT_SEED).with_source(built_from);
        if let Err(e) = store::save_json(path, &model) {
            tracing::warn!(error = %e, "could not persist babble model");
        }
        model
    }

    fn lemma_corpus(&self) -> String {
        self.lexicon()
            .records()
            .iter()
            .take(LEMMA_CORPUS_LIMIT)
            .map(|r| format!("{} ", r.lemma))
            .collect()
    }
}

fn grounded_answer(lemma: &str, rec: &LexiconRecord, offset: u64, synset: &Synset) -> String {
    let mut synonyms: Vec<String> = synset
        .synonyms
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('_', " "))
        .collect();
    synonyms.sort();
    synonyms.dedup();
    let synonyms = if synonyms.is_empty() {
        "(none)".to_string()
    } else {
        synonyms.join(", ")
    };
    let pos_letter = rec.pos.chars().next().unwrap_or('?');
    format!(
        "{lemma} ({pos}) — Definition: {gloss}. Synonyms: {synonyms}. Provenance: WordNet offset {offset:08} in data.{pos_letter}",
        pos = rec.pos,
        gloss = synset.gloss,
    )
}
