//! Gloss and synonym lookup in WordNet `data.<pos>` files.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synset {
    pub gloss: String,
    pub synonyms: Vec<String>,
}

/// Data file holding synsets for a part of speech (`noun`, `v`, `adj`, `r`, ...).
pub fn data_file(pos: &str) -> Option<&'static str> {
    match pos.to_ascii_lowercase().chars().next()? {
        'n' => Some("data.noun"),
        'v' => Some("data.verb"),
        'a' => Some("data.adj"),
        'r' => Some("data.adv"),
        _ => None,
    }
}

/// Parse a synset line: `offset lex_filenum ss_type w_cnt word lex_id ... | gloss`.
///
/// `w_cnt` is hexadecimal; words are lowercased.
pub fn parse_data_line(line: &str) -> Synset {
    let (head, gloss) = match line.split_once(" | ") {
        Some((head, gloss)) => (head, gloss.trim()),
        None => (line, ""),
    };
    let tokens: Vec<&str> = head.split_whitespace().collect();
    let word_count = tokens
        .get(3)
        .and_then(|t| usize::from_str_radix(t, 16).ok())
        .unwrap_or(0);
    let synonyms = tokens
        .iter()
        .skip(4)
        .step_by(2)
        .take(word_count)
        .map(|w| w.to_lowercase())
        .collect();
    Synset {
        gloss: gloss.to_string(),
        synonyms,
    }
}

/// Scan `data.<pos>` for the line starting with the zero-padded offset.
pub fn read_synset(dict_dir: &Path, pos: &str, offset: u64) -> Option<Synset> {
    let path = dict_dir.join(data_file(pos)?);
    let file = File::open(&path).ok()?;
    let target = format!("{offset:08}");
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.starts_with(' ') && !line.starts_with('#'))
        .find(|line| line.starts_with(&target))
        .map(|line| parse_data_line(&line))
}

/// Memoised [`read_synset`]; only hits are remembered.
pub struct GlossCache {
    dict_dir: PathBuf,
    entries: Mutex<HashMap<(String, u64), Synset>>,
}

impl GlossCache {
    pub fn new(dict_dir: impl Into<PathBuf>) -> Self {
        Self {
            dict_dir: dict_dir.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, pos: &str, offset: u64) -> Option<Synset> {
        let key = (pos.to_string(), offset);
        if let Some(hit) = self.lock().get(&key) {
            return Some(hit.clone());
        }
        let synset = read_synset(&self.dict_dir, pos, offset)?;
        self.lock().insert(key, synset.clone());
        Some(synset)
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, u64), Synset>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
