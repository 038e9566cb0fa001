//! Desired-state store
//!
//! The JSON document on disk is the single source of truth. It is read fresh
//! on every call and replaced wholesale on save via write-to-temp + rename,
//! so readers never observe a partially written file.

use crate::models::DesiredState;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Default location of the desired-state document
pub const DEFAULT_CONFIG_PATH: &str = "/config/container_limits.json";

/// Environment variable overriding the document location
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Errors loading or saving the desired-state document
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed store of the desired state
#[derive(Debug, Clone)]
pub struct DesiredStateStore {
    path: PathBuf,
}

impl DesiredStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the desired state, treating a missing or malformed document as empty
    pub fn load(&self) -> DesiredState {
        match self.load_strict() {
            Ok(state) => state,
            Err(StoreError::Missing { path }) => {
                debug!(path = %path.display(), "No desired-state document, nothing to reconcile");
                DesiredState::new()
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable desired-state document");
                DesiredState::new()
            }
        }
    }

    /// Load the desired state, failing if the document is absent or malformed
    pub fn load_strict(&self) -> Result<DesiredState, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Replace the document with exactly `state`
    pub fn save(&self, state: &DesiredState) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let content = serde_json::to_string_pretty(state).map_err(|e| StoreError::Malformed {
            path: self.path.clone(),
            source: e,
        })?;

        // Temp file in the same directory so the rename stays on one filesystem
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(path = %self.path.display(), entries = state.len(), "Saved desired state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceSpec;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> DesiredStateStore {
        DesiredStateStore::new(dir.path().join("container_limits.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.load().is_empty());
        assert!(matches!(
            store.load_strict(),
            Err(StoreError::Missing { .. })
        ));
    }

    #[test]
    fn test_load_malformed_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().is_empty());
        assert!(matches!(
            store.load_strict(),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn test_load_wrong_shape_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        std::fs::write(store.path(), r#"["web-app", "cache"]"#).unwrap();
        assert!(store.load().is_empty());

        std::fs::write(store.path(), r#"{"web-app": "512m"}"#).unwrap();
        assert!(store.load().is_empty());
        assert!(store.load_strict().is_err());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut state = DesiredState::new();
        state.insert("web-app".into(), ResourceSpec::new("512m", "1.0"));
        state.insert("cache".into(), ResourceSpec::new("256m", "0.5"));

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
        assert_eq!(store.load_strict().unwrap(), state);
    }

    #[test]
    fn test_save_is_full_replace() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut first = DesiredState::new();
        first.insert("a".into(), ResourceSpec::new("64m", "0.2"));
        first.insert("b".into(), ResourceSpec::new("128m", "0.4"));
        store.save(&first).unwrap();

        let mut second = DesiredState::new();
        second.insert("a".into(), ResourceSpec::new("1g", "2.0"));
        store.save(&second).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, second);
        assert!(!loaded.contains_key("b"));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = DesiredStateStore::new(dir.path().join("nested/config/limits.json"));

        store.save(&DesiredState::new()).unwrap();
        assert!(store.path().exists());
        assert!(store.load_strict().unwrap().is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut state = DesiredState::new();
        state.insert("svc".into(), ResourceSpec::new("128m", "0.5"));
        store.save(&state).unwrap();
        store.save(&state).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
