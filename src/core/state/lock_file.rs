use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{StarterError, StarterResult};

pub const LOCK_FILE: &str = "serverstarter.lock";

/// Persisted record of what has already been installed.
///
/// Created on the first successful loader install and read on every
/// subsequent run. Never deleted automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LockState {
    pub loader_installed: bool,
    pub loader_version: String,
    pub mc_version: String,
    pub sponge_bootstrapper: String,
}

impl LockState {
    pub fn path_in(base: &Path) -> PathBuf {
        base.join(LOCK_FILE)
    }

    /// Read the lock from `base`. A missing or unreadable lock is treated as
    /// "nothing installed yet".
    pub fn load(base: &Path) -> Self {
        let path = Self::path_in(base);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No lock file at {:?}: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(lock) => lock,
            Err(e) => {
                warn!("Corrupt lock file at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, base: &Path) -> StarterResult<()> {
        let path = Self::path_in(base);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(StarterError::io(path))
    }

    /// Whether the installed loader covers the configured versions. An empty
    /// pinned version (taken from the pack manifest later) accepts whatever
    /// was installed.
    pub fn satisfies(&self, pinned_loader: &str, pinned_mc: &str) -> bool {
        let matches = |pinned: &str, installed: &str| pinned.is_empty() || pinned == installed;
        self.loader_installed
            && matches(pinned_loader.trim(), self.loader_version.as_str())
            && matches(pinned_mc.trim(), self.mc_version.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lock_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockState::load(dir.path());
        assert_eq!(lock, LockState::default());
        assert!(!lock.satisfies("", ""));
    }

    #[test]
    fn saved_lock_reports_installed_for_matching_versions() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockState {
            loader_installed: true,
            loader_version: "47.2.0".into(),
            mc_version: "1.20.1".into(),
            sponge_bootstrapper: String::new(),
        };
        lock.save(dir.path()).unwrap();

        let reloaded = LockState::load(dir.path());
        assert!(reloaded.satisfies("47.2.0", "1.20.1"));
        assert!(!reloaded.satisfies("47.3.0", "1.20.1"));
    }

    #[test]
    fn unpinned_versions_accept_the_installed_loader() {
        let lock = LockState {
            loader_installed: true,
            loader_version: "47.2.0".into(),
            mc_version: "1.20.1".into(),
            sponge_bootstrapper: String::new(),
        };
        assert!(lock.satisfies("", ""));
        assert!(lock.satisfies("47.2.0", ""));
        assert!(!lock.satisfies("", "1.19.2"));
        assert!(!LockState::default().satisfies("", ""));
    }

    #[test]
    fn corrupt_lock_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), "not json").unwrap();
        assert_eq!(LockState::load(dir.path()), LockState::default());
    }
}
