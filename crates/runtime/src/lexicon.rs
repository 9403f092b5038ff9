//! The WordNet lexicon index: `artifacts/indices/wordnet-lexicon.jsonl`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeResult;

/// Offsets kept per lemma.
pub const MAX_OFFSETS: usize = 8;

/// WordNet index files and the part of speech each one records.
pub const INDEX_FILES: [(&str, &str); 4] = [
    ("index.noun", "noun"),
    ("index.verb", "verb"),
    ("index.adj", "adj"),
    ("index.adv", "adv"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconRecord {
    pub lemma: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub offsets: Vec<u64>,
}

impl LexiconRecord {
    /// Lowest offset, the one glosses are read from.
    pub fn primary_offset(&self) -> Option<u64> {
        self.offsets.iter().copied().min()
    }
}

/// Parsed index with a lowercase lemma lookup.
#[derive(Debug, Default)]
pub struct LexiconIndex {
    records: Vec<LexiconRecord>,
    by_lemma: HashMap<String, usize>,
}

impl LexiconIndex {
    pub fn from_records(records: Vec<LexiconRecord>) -> Self {
        let mut by_lemma = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            by_lemma.entry(r.lemma.to_lowercase()).or_insert(i);
        }
        Self { records, by_lemma }
    }

    /// Read a JSON-lines index; unparseable lines and records without a lemma are skipped.
    /// A missing file is an empty index.
    pub fn load(path: &Path) -> Self {
        let Ok(file) = File::open(path) else {
            return Self::default();
        };
        let records = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                serde_json::from_str::<LexiconRecord>(line)
                    .ok()
                    .filter(|r| !r.lemma.is_empty())
            })
            .collect();
        Self::from_records(records)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[LexiconRecord] {
        &self.records
    }

    pub fn contains(&self, lemma: &str) -> bool {
        self.by_lemma.contains_key(lemma)
    }

    /// First record whose lemma matches, case-insensitively.
    pub fn find(&self, lemma: &str) -> Option<&LexiconRecord> {
        self.by_lemma
            .get(&lemma.to_lowercase())
            .map(|&i| &self.records[i])
    }
}

/// Parse one line of a WordNet `index.<pos>` file.
///
/// Layout: `lemma pos synset_cnt p_cnt [ptr...] sense_cnt tagsense_cnt offset...`.
/// Offsets are the last `synset_cnt` integer tokens, in file order, capped at
/// [`MAX_OFFSETS`]. When `synset_cnt` is unusable the whole trailing integer run
/// is taken. License header lines (leading whitespace) and comments are ignored.
pub fn parse_index_line(line: &str, pos: &str) -> Option<LexiconRecord> {
    if line.starts_with(' ') || line.starts_with('#') {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let mut trailing: Vec<u64> = parts
        .iter()
        .rev()
        .map_while(|tok| tok.parse::<u64>().ok())
        .collect();
    if trailing.is_empty() {
        return None;
    }
    trailing.reverse();

    let declared = parts[2]
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=trailing.len()).contains(n));
    let mut offsets = match declared {
        Some(n) => trailing.split_off(trailing.len() - n),
        None => trailing,
    };
    offsets.truncate(MAX_OFFSETS);
    Some(LexiconRecord {
        lemma: parts[0].to_string(),
        pos: pos.to_string(),
        offsets,
    })
}

/// Build the lexicon index from the `index.*` files under `dict_dir`.
///
/// Absent index files are skipped; returns the number of records written.
pub fn build_index(dict_dir: &Path, out: &Path) -> RuntimeResult<usize> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(out)?);
    let mut count = 0;
    for (file_name, pos) in INDEX_FILES {
        let path = dict_dir.join(file_name);
        let Ok(file) = File::open(&path) else {
            continue;
        };
        for line in BufReader::new(file).lines().map_while(Result::ok) {
            if let Some(record) = parse_index_line(&line, pos) {
                serde_json::to_writer(&mut writer, &record).map_err(std::io::Error::other)?;
                writer.write_all(b"\n")?;
                count += 1;
            }
        }
    }
    writer.flush()?;
    tracing::info!(records = count, path = %out.display(), "lexicon index built");
    Ok(count)
}
