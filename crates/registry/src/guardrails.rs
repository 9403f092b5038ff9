//! Guardrail configuration: `registry/guardrails/config.json`.
//!
//! The stored document is kept as raw JSON so readiness can report on invalid
//! values; [`GuardrailPolicy`] is the lenient typed view the chat runtime uses.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value, json};

use workbench_core::store;

use crate::error::{RegistryError, RegistryResult};

pub const DEFAULT_MAX_TOKENS: usize = 256;

/// Keys an update may set; anything else in a payload is ignored.
pub const KNOWN_KEYS: [&str; 4] = ["max_tokens", "pii_regex", "content_filters", "allowed_file_types"];

pub fn default_config() -> Value {
    json!({
        "max_tokens": DEFAULT_MAX_TOKENS,
        "pii_regex": ["\\b\\d{3}-\\d{2}-\\d{4}\\b"],
        "content_filters": ["hate", "violence"],
        "allowed_file_types": [".txt", ".csv", ".json"],
    })
}

/// Typed guardrail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardrailPolicy {
    pub max_tokens: usize,
    pub pii_regex: Vec<String>,
    pub content_filters: Vec<String>,
    pub allowed_file_types: Vec<String>,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self::from_value(&default_config())
    }
}

impl GuardrailPolicy {
    /// Read a config document, falling back to defaults per field when a value
    /// is missing or has the wrong shape. Non-string list items are dropped.
    pub fn from_value(doc: &Value) -> Self {
        let max_tokens = doc
            .get("max_tokens")
            .and_then(Value::as_u64)
            .filter(|n| *n >= 1)
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let strings = |key: &str, fallback: &[&str]| -> Vec<String> {
            match doc.get(key).and_then(Value::as_array) {
                Some(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                None => fallback.iter().map(|s| s.to_string()).collect(),
            }
        };
        Self {
            max_tokens,
            pii_regex: strings("pii_regex", &["\\b\\d{3}-\\d{2}-\\d{4}\\b"]),
            content_filters: strings("content_filters", &["hate", "violence"]),
            allowed_file_types: strings("allowed_file_types", &[".txt", ".csv", ".json"]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardrailStore {
    path: PathBuf,
}

impl GuardrailStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The stored document, `Ok(None)` when nothing has been saved.
    pub fn load_raw(&self) -> RegistryResult<Option<Value>> {
        Ok(store::load_json_opt(&self.path)?)
    }

    /// Stored document or defaults.
    pub fn current(&self) -> RegistryResult<Value> {
        Ok(self.load_raw()?.unwrap_or_else(default_config))
    }

    /// Typed policy; an unreadable config degrades to defaults with a warning.
    pub fn policy(&self) -> GuardrailPolicy {
        match self.current() {
            Ok(doc) => GuardrailPolicy::from_value(&doc),
            Err(e) => {
                tracing::warn!(error = %e, "guardrail config unreadable, using defaults");
                GuardrailPolicy::default()
            }
        }
    }

    /// Merge the known keys of `payload` over the defaults and persist the result.
    pub fn update(&self, payload: &Value) -> RegistryResult<Value> {
        let Some(incoming) = payload.as_object() else {
            return Err(RegistryError::validation("guardrail payload must be an object"));
        };
        let mut merged: Map<String, Value> = match default_config() {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        for key in KNOWN_KEYS {
            if let Some(v) = incoming.get(key) {
                merged.insert(key.to_string(), v.clone());
            }
        }
        let doc = Value::Object(merged);
        store::save_json(&self.path, &doc)?;
        tracing::info!("guardrails updated");
        Ok(doc)
    }
}
