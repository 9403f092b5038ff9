//! Character bigram "babble" used when the n-gram model has nothing to say.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ngram::{self, Counts};

/// Unigram entries kept when a model is persisted.
pub const MAX_UNIGRAMS: usize = 200;
/// Bigram contexts kept when a model is persisted.
pub const MAX_BIGRAMS: usize = 2_000;
pub const BABBLE_ORDER: usize = 2;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz ";
const ALPHABET_REPEAT: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BabbleModel {
    pub seed: u64,
    #[serde(default = "default_order")]
    pub order: usize,
    #[serde(default)]
    pub unigram: BTreeMap<String, u64>,
    #[serde(default)]
    pub bigram: Counts,
    #[serde(default)]
    pub built_from: Option<String>,
}

fn default_order() -> usize {
    BABBLE_ORDER
}

/// Lowercase; anything outside letters, space, newline and `.,!?:;` becomes a space.
pub fn clean(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || " .,!?:;\n".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Text used when neither datasets nor an index exist.
pub fn alphabet_corpus() -> String {
    ALPHABET.repeat(ALPHABET_REPEAT)
}

impl BabbleModel {
    pub fn build(corpus: &str, seed: u64) -> Self {
        let chars: Vec<char> = clean(corpus).chars().collect();
        let mut unigram = BTreeMap::<String, u64>::new();
        let mut bigram = Counts::new();
        for c in &chars {
            *unigram.entry(c.to_string()).or_insert(0) += 1;
        }
        for pair in chars.windows(2) {
            *bigram
                .entry(pair[0].to_string())
                .or_default()
                .entry(pair[1].to_string())
                .or_insert(0) += 1;
        }
        Self {
            seed,
            order: BABBLE_ORDER,
            unigram: unigram.into_iter().take(MAX_UNIGRAMS).collect(),
            bigram: bigram.into_iter().take(MAX_BIGRAMS).collect(),
            built_from: None,
        }
    }

    pub fn with_source(mut self, built_from: Option<String>) -> Self {
        self.built_from = built_from;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.unigram.is_empty()
    }

    /// `n` characters following the last character of `seed_text`.
    ///
    /// Each step draws from the bigram row of the previous character, then
    /// from the unigram table; with neither it emits a space.
    pub fn babble(&self, seed_text: &str, n: usize, rng: &mut StdRng) -> String {
        let mut prev = seed_text.chars().last().unwrap_or(' ').to_string();
        let mut out = String::with_capacity(n);
        for _ in 0..n {
            let next = self
                .bigram
                .get(&prev)
                .filter(|row| !row.is_empty())
                .and_then(|row| ngram::sample(row, rng))
                .or_else(|| ngram::sample(&self.unigram, rng))
                .unwrap_or_else(|| " ".to_string());
            out.push_str(&next);
            prev = next;
        }
        out
    }
}
