//! Process configuration read from the environment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::layout::WorkbenchLayout;
use crate::rng::DEFAULT_SEED;

const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Snapshot of the settings a workbench process runs with.
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    /// Root directory holding modules, registry and artifacts (`WORKBENCH_ROOT`).
    pub root: PathBuf,
    /// HTTP listen address (`WORKBENCH_BIND`).
    pub bind: SocketAddr,
    /// Seed for bootstrap and chat generation (`WORKBENCH_SEED`).
    pub seed: u64,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bind: default_bind(),
            seed: DEFAULT_SEED,
        }
    }
}

impl WorkbenchConfig {
    /// Read configuration from the process environment.
    ///
    /// Unparsable values fall back to their defaults with a warning rather than
    /// aborting startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(root) = lookup("WORKBENCH_ROOT").filter(|v| !v.trim().is_empty()) {
            cfg.root = PathBuf::from(root);
        }

        if let Some(raw) = lookup("WORKBENCH_BIND") {
            match raw.parse() {
                Ok(addr) => cfg.bind = addr,
                Err(e) => tracing::warn!(value = %raw, error = %e, "invalid WORKBENCH_BIND; using default"),
            }
        }

        if let Some(raw) = lookup("WORKBENCH_SEED") {
            match raw.trim().parse() {
                Ok(seed) => cfg.seed = seed,
                Err(e) => tracing::warn!(value = %raw, error = %e, "invalid WORKBENCH_SEED; using default"),
            }
        }

        cfg
    }

    pub fn layout(&self) -> WorkbenchLayout {
        WorkbenchLayout::new(self.root.clone())
    }
}

fn default_bind() -> SocketAddr {
    DEFAULT_BIND
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = WorkbenchConfig::from_lookup(|_| None);
        assert_eq!(cfg.seed, 1337);
        assert_eq!(cfg.bind.port(), 8000);
        assert_eq!(cfg.root, PathBuf::from("."));
    }

    #[test]
    fn invalid_values_fall_back() {
        let vars: HashMap<&str, &str> = [
            ("WORKBENCH_ROOT", "/data/wb"),
            ("WORKBENCH_BIND", "not-an-address"),
            ("WORKBENCH_SEED", "42"),
        ]
        .into_iter()
        .collect();
        let cfg = WorkbenchConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.root, PathBuf::from("/data/wb"));
        assert_eq!(cfg.bind.port(), 8000);
        assert_eq!(cfg.seed, 42);
    }
}
