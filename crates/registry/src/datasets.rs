//! Dataset registry: `registry/datasets/<id>.json`, plus upload ingestion.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use workbench_core::{WorkbenchLayout, csv, id, store};

use crate::entry_path;
use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFile {
    pub path: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub files: Vec<DatasetFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    Missing,
    ChecksumMismatch,
}

/// One integrity failure found by [`DatasetRegistry::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProblem {
    pub error: ProblemKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Payload formats accepted by [`DatasetRegistry::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestFormat {
    Jsonl,
    Text,
    Csv,
    Json,
}

impl FromStr for IngestFormat {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jsonl" => Ok(Self::Jsonl),
            "text" | "txt" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(RegistryError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for IngestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jsonl => "jsonl",
            Self::Text => "text",
            Self::Csv => "csv",
            Self::Json => "json",
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub capability: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_format() -> String {
    "jsonl".to_string()
}

#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    dir: PathBuf,
    layout: WorkbenchLayout,
}

impl DatasetRegistry {
    pub fn new(layout: WorkbenchLayout) -> Self {
        Self {
            dir: layout.dataset_entries_dir(),
            layout,
        }
    }

    pub fn list(&self) -> Vec<DatasetEntry> {
        store::list_json(&self.dir)
    }

    pub fn exists(&self, id: &str) -> bool {
        entry_path(&self.dir, id).is_some_and(|p| p.is_file())
    }

    pub fn get(&self, id: &str) -> RegistryResult<Option<DatasetEntry>> {
        let Some(path) = entry_path(&self.dir, id) else {
            return Ok(None);
        };
        Ok(store::load_json_opt(&path)?)
    }

    pub fn save(&self, entry: &DatasetEntry) -> RegistryResult<()> {
        let path = entry_path(&self.dir, &entry.id)
            .ok_or_else(|| RegistryError::validation(format!("invalid dataset id: {:?}", entry.id)))?;
        store::save_json(&path, entry)?;
        Ok(())
    }

    /// Record `files` with their current checksums under `id`, replacing any prior entry.
    ///
    /// Files that do not exist yet are recorded with a null checksum.
    pub fn register(&self, id: &str, name: &str, files: &[PathBuf]) -> RegistryResult<DatasetEntry> {
        let mut recorded = Vec::with_capacity(files.len());
        for file in files {
            let sha256 = if file.is_file() {
                Some(store::sha256_file(file)?)
            } else {
                None
            };
            recorded.push(DatasetFile {
                path: self.layout.relativize(file),
                sha256,
            });
        }

        let entry = DatasetEntry {
            id: id.to_string(),
            name: name.to_string(),
            files: recorded,
            ..DatasetEntry::default()
        };
        self.save(&entry)?;
        tracing::info!(dataset_id = %id, files = entry.files.len(), "dataset registered");
        Ok(entry)
    }

    /// Compare every listed file against its recorded checksum.
    ///
    /// A file that exists but cannot be hashed is reported as missing.
    pub fn verify(&self, entry: &DatasetEntry) -> Vec<DatasetProblem> {
        let mut problems = Vec::new();
        for file in &entry.files {
            let resolved = self.layout.resolve(&file.path);
            if !resolved.exists() {
                problems.push(DatasetProblem {
                    error: ProblemKind::Missing,
                    path: file.path.clone(),
                    expected: None,
                    actual: None,
                });
                continue;
            }
            let Some(expected) = file.sha256.as_deref() else {
                continue;
            };
            match store::sha256_file(&resolved) {
                Ok(actual) if actual.eq_ignore_ascii_case(expected) => {}
                Ok(actual) => problems.push(DatasetProblem {
                    error: ProblemKind::ChecksumMismatch,
                    path: file.path.clone(),
                    expected: Some(expected.to_string()),
                    actual: Some(actual),
                }),
                Err(e) => {
                    tracing::warn!(path = %resolved.display(), error = %e, "dataset file unreadable");
                    problems.push(DatasetProblem {
                        error: ProblemKind::Missing,
                        path: file.path.clone(),
                        expected: Some(expected.to_string()),
                        actual: None,
                    });
                }
            }
        }
        problems
    }

    /// Normalise an uploaded payload into `uploads/<id>.jsonl` and register it.
    pub fn ingest(&self, req: IngestRequest) -> RegistryResult<DatasetEntry> {
        let format: IngestFormat = req.format.parse()?;
        let id = match req.id.filter(|s| !s.trim().is_empty()) {
            Some(id) => id,
            None => id::generated_id("upload"),
        };
        if entry_path(&self.dir, &id).is_none() {
            return Err(RegistryError::validation(format!("invalid dataset id: {id:?}")));
        }

        let records = normalize(format, &req.content)?;
        let out = self.layout.uploads_dir().join(format!("{id}.jsonl"));
        write_jsonl(&out, &records)?;

        let name = req.name.filter(|s| !s.is_empty()).unwrap_or_else(|| id.clone());
        let mut entry = self.register(&id, &name, &[out])?;
        entry.capability = Some(req.capability.unwrap_or_else(|| "chat".to_string()));
        entry.tags = req.tags;
        self.save(&entry)?;

        tracing::info!(dataset_id = %id, %format, records = records.len(), "dataset ingested");
        Ok(entry)
    }
}

fn normalize(format: IngestFormat, content: &str) -> RegistryResult<Vec<Value>> {
    let records = match format {
        IngestFormat::Jsonl => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).unwrap_or_else(|_| json!({ "text": l })))
            .collect(),
        IngestFormat::Text => content
            .lines()
            .enumerate()
            .filter_map(|(k, l)| {
                let l = l.trim();
                (!l.is_empty()).then(|| json!({ "id": format!("t_{k}"), "prompt": l, "response": l }))
            })
            .collect(),
        IngestFormat::Csv => content
            .lines()
            .enumerate()
            .filter_map(|(k, l)| {
                let cell = csv::first_field(l);
                (!cell.is_empty())
                    .then(|| json!({ "id": format!("c_{k}"), "prompt": cell, "response": cell }))
            })
            .collect(),
        IngestFormat::Json => {
            let doc: Value = serde_json::from_str(content)
                .map_err(|e| RegistryError::validation(format!("invalid JSON payload: {e}")))?;
            match doc {
                Value::Array(items) => items.into_iter().map(as_record).collect(),
                Value::Object(mut obj) => match obj.remove("items") {
                    Some(Value::Array(items)) => items.into_iter().map(as_record).collect(),
                    Some(other) => {
                        obj.insert("items".to_string(), other);
                        vec![Value::Object(obj)]
                    }
                    None => vec![Value::Object(obj)],
                },
                other => vec![as_record(other)],
            }
        }
    };
    Ok(records)
}

fn as_record(item: Value) -> Value {
    match item {
        Value::Object(_) => item,
        Value::String(s) => json!({ "text": s }),
        other => json!({ "text": other.to_string() }),
    }
}

fn write_jsonl(path: &Path, records: &[Value]) -> RegistryResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = String::new();
    for record in records {
        body.push_str(&record.to_string());
        body.push('\n');
    }
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, DatasetRegistry) {
        let tmp = tempfile::tempdir().unwrap();
        let reg = DatasetRegistry::new(WorkbenchLayout::new(tmp.path()));
        (tmp, reg)
    }

    #[test]
    fn verify_is_clean_until_the_file_changes() {
        let (tmp, reg) = registry();
        let file = tmp.path().join("artifacts/datasets/d.jsonl");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "{\"a\":1}\n").unwrap();

        let entry = reg.register("d", "D", &[file.clone()]).unwrap();
        assert_eq!(entry.files[0].path, "artifacts/datasets/d.jsonl");
        assert!(reg.verify(&entry).is_empty());

        std::fs::write(&file, "{\"a\":2}\n").unwrap();
        let problems = reg.verify(&entry);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].error, ProblemKind::ChecksumMismatch);
        assert_eq!(problems[0].path, "artifacts/datasets/d.jsonl");
        assert_eq!(problems[0].expected, entry.files[0].sha256);
        assert!(problems[0].actual.is_some());
    }

    #[test]
    fn verify_reports_missing_files_and_ignores_null_checksums() {
        let (tmp, reg) = registry();
        let present = tmp.path().join("present.txt");
        std::fs::write(&present, "x").unwrap();
        let entry = DatasetEntry {
            id: "d".into(),
            name: "d".into(),
            files: vec![
                DatasetFile { path: "gone.txt".into(), sha256: Some("00".into()) },
                DatasetFile { path: "present.txt".into(), sha256: None },
            ],
            ..DatasetEntry::default()
        };
        let problems = reg.verify(&entry);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].error, ProblemKind::Missing);
        assert_eq!(problems[0].path, "gone.txt");
    }

    #[test]
    fn checksum_comparison_ignores_case() {
        let (tmp, reg) = registry();
        let file = tmp.path().join("f.txt");
        std::fs::write(&file, "abc").unwrap();
        let mut entry = reg.register("f", "f", &[file]).unwrap();
        entry.files[0].sha256 = entry.files[0].sha256.as_ref().map(|s| s.to_uppercase());
        assert!(reg.verify(&entry).is_empty());
    }

    #[test]
    fn ingest_text_writes_prompt_response_pairs() {
        let (tmp, reg) = registry();
        let entry = reg
            .ingest(IngestRequest {
                id: Some("notes".into()),
                format: "text".into(),
                content: "first line\n\nsecond line\n".into(),
                ..IngestRequest::default()
            })
            .unwrap();
        assert_eq!(entry.capability.as_deref(), Some("chat"));
        assert_eq!(entry.files[0].path, "artifacts/datasets/uploads/notes.jsonl");

        let body = std::fs::read_to_string(tmp.path().join(&entry.files[0].path)).unwrap();
        let lines: Vec<Value> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "t_0");
        assert_eq!(lines[1]["id"], "t_2");
        assert_eq!(lines[1]["response"], "second line");
        assert!(reg.verify(&entry).is_empty());
    }

    #[test]
    fn ingest_json_unwraps_items_and_wraps_scalars() {
        let (tmp, reg) = registry();
        let entry = reg
            .ingest(IngestRequest {
                format: "json".into(),
                content: r#"{"items": [{"prompt": "p"}, "loose", 3]}"#.into(),
                ..IngestRequest::default()
            })
            .unwrap();
        assert!(entry.id.starts_with("upload_"));
        let body = std::fs::read_to_string(tmp.path().join(&entry.files[0].path)).unwrap();
        let lines: Vec<Value> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines[0]["prompt"], "p");
        assert_eq!(lines[1]["text"], "loose");
        assert_eq!(lines[2]["text"], "3");
    }

    #[test]
    fn ingest_jsonl_keeps_unparseable_lines_as_text() {
        let (tmp, reg) = registry();
        let entry = reg
            .ingest(IngestRequest {
                id: Some("mixed".into()),
                format: "jsonl".into(),
                content: "{\"prompt\":\"a\"}\nplain words\n".into(),
                ..IngestRequest::default()
            })
            .unwrap();
        let body = std::fs::read_to_string(tmp.path().join(&entry.files[0].path)).unwrap();
        assert!(body.contains("\"text\":\"plain words\""));
    }

    #[test]
    fn ingest_rejects_unknown_formats() {
        let (_tmp, reg) = registry();
        let err = reg
            .ingest(IngestRequest { format: "parquet".into(), ..IngestRequest::default() })
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedFormat(f) if f == "parquet"));
    }

    #[test]
    fn csv_ingest_keeps_quoted_commas_in_the_first_cell() {
        let records = normalize(IngestFormat::Csv, "\"Paris, France\",capital\n\nplain,x\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["prompt"], "Paris, France");
        assert_eq!(records[0]["id"], "c_0");
        assert_eq!(records[1]["prompt"], "plain");
        assert_eq!(records[1]["id"], "c_2");
    }
}
