//! Text guardrails: word truncation, PII masking, content flags.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use workbench_registry::GuardrailPolicy;

pub const PII_MASK: &str = "[PII]";

/// One intervention recorded while guarding a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardrailAction {
    Truncate { max_tokens: usize },
    PiiMask { pattern: String },
    ContentFlag { categories: Vec<String> },
    AntiEcho { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedText {
    pub original: String,
    pub result: String,
    pub actions: Vec<GuardrailAction>,
}

/// Guard `text` under `policy`.
///
/// Truncation happens first, so masking and flagging only see the kept words.
/// Patterns that fail to compile are skipped.
pub fn apply(text: &str, policy: &GuardrailPolicy) -> GuardedText {
    let mut actions = Vec::new();
    let mut result = text.to_string();

    let words: Vec<&str> = result.split_whitespace().collect();
    if words.len() > policy.max_tokens {
        result = words[..policy.max_tokens].join(" ");
        actions.push(GuardrailAction::Truncate {
            max_tokens: policy.max_tokens,
        });
    }

    for pattern in &policy.pii_regex {
        let Ok(re) = Regex::new(pattern) else {
            tracing::debug!(%pattern, "skipping invalid pii pattern");
            continue;
        };
        if re.is_match(&result) {
            result = re.replace_all(&result, PII_MASK).into_owned();
            actions.push(GuardrailAction::PiiMask {
                pattern: pattern.clone(),
            });
        }
    }

    let flagged: Vec<String> = policy
        .content_filters
        .iter()
        .filter(|word| mentions(&result, word))
        .cloned()
        .collect();
    if !flagged.is_empty() {
        actions.push(GuardrailAction::ContentFlag { categories: flagged });
    }

    GuardedText {
        original: text.to_string(),
        result,
        actions,
    }
}

fn mentions(text: &str, word: &str) -> bool {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(word)))
        .case_insensitive(true)
        .build()
        .is_ok_and(|re| re.is_match(text))
}
