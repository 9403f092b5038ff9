//! JSON blob store on the local filesystem.
//!
//! Every registry entity is one pretty-printed JSON document at a deterministic
//! path. Writes go through a sibling temp file and a rename so readers never
//! observe a half-written document.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

/// Load and decode one JSON document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a document if it exists; `Ok(None)` when the file is absent.
pub fn load_json_opt<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match load_json(path) {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Encode and write a document, creating parent directories as needed.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, doc: &T) -> StoreResult<()> {
    let body = serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, body).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Decode every `*.json` document in `dir`, skipping anything unreadable.
///
/// A missing directory is an empty collection. Skipped files are logged at
/// `warn` so corruption is at least visible in the process logs.
pub fn list_json<T: DeserializeOwned>(dir: &Path) -> Vec<T> {
    let mut items = Vec::new();
    for path in json_files(dir) {
        match load_json(&path) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document"),
        }
    }
    items
}

/// Paths of `*.json` files directly under `dir`, sorted by file name.
pub fn json_files(dir: &Path) -> Vec<PathBuf> {
    files_with_extension(dir, "json")
}

/// Paths of files with extension `ext` directly under `dir`, sorted by file name.
pub fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == ext))
        .collect();
    paths.sort();
    paths
}

/// Lowercase hex SHA-256 of a file's contents, streamed in 64 KiB chunks.
pub fn sha256_file(path: &Path) -> StoreResult<String> {
    sha256_files(std::slice::from_ref(&path))
}

/// SHA-256 of the concatenated contents of `paths`, in order.
pub fn sha256_files<P: AsRef<Path>>(paths: &[P]) -> StoreResult<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    for path in paths {
        let path = path.as_ref();
        let mut file = fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
        loop {
            let n = file.read(&mut buf).map_err(|e| StoreError::io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
