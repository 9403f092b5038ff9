//! File-backed values that reload when the backing file's mtime changes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

struct Slot<T> {
    modified: Option<SystemTime>,
    value: Arc<T>,
}

pub struct MtimeCache<T> {
    path: PathBuf,
    slot: Mutex<Option<Slot<T>>>,
}

impl<T> MtimeCache<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached value, reloading through `load` when the file changed or appeared.
    pub fn get_or_load(&self, load: impl FnOnce(&Path) -> T) -> Arc<T> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let current = modified(&self.path);
        if let Some(s) = slot.as_ref() {
            if s.modified == current {
                return Arc::clone(&s.value);
            }
        }

        let value = Arc::new(load(&self.path));
        tracing::debug!(path = %self.path.display(), "cache reloaded");
        *slot = Some(Slot {
            modified: modified(&self.path),
            value: Arc::clone(&value),
        });
        value
    }

    /// Drop the cached value; the next read reloads.
    pub fn reset(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
