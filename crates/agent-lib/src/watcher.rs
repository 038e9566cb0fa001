//! Desired-state file watching
//!
//! Watches the directory holding the desired-state document and requests
//! a reconcile whenever the document is written or replaced, so hand edits
//! take effect without waiting for the next tick.

use crate::scheduler::ReconcileTrigger;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Watches one file and pokes the reconcile trigger on change
pub struct StateFileWatcher {
    path: PathBuf,
    trigger: ReconcileTrigger,
}

/// Stops watching when dropped
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
}

impl StateFileWatcher {
    pub fn new(path: impl Into<PathBuf>, trigger: ReconcileTrigger) -> Self {
        Self {
            path: path.into(),
            trigger,
        }
    }

    /// Start watching.
    ///
    /// The parent directory is watched rather than the file itself, since an
    /// atomic save replaces the file's inode.
    pub fn start(self) -> Result<WatcherHandle> {
        let dir = watch_dir(&self.path);
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("{} has no file name", self.path.display()))?;

        let trigger = self.trigger;
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_relevant(&event, &file_name) {
                        debug!(paths = ?event.paths, "Desired-state document changed");
                        trigger.request();
                    }
                }
                Err(e) => warn!(error = %e, "Desired-state watcher error"),
            },
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        info!(path = %self.path.display(), "Watching desired-state document");

        Ok(WatcherHandle { _watcher: watcher })
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Writes, creations, renames and removals of the watched file
fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RenameMode};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_is_relevant_matches_target_file() {
        let name = OsString::from("container_limits.json");

        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), "/config/container_limits.json"),
            &name
        ));
        assert!(is_relevant(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                "/config/container_limits.json"
            ),
            &name
        ));
    }

    #[test]
    fn test_is_relevant_ignores_other_files_and_reads() {
        let name = OsString::from("container_limits.json");

        assert!(!is_relevant(
            &event(EventKind::Create(CreateKind::File), "/config/.tmpAbc123"),
            &name
        ));
        assert!(!is_relevant(
            &event(
                EventKind::Access(AccessKind::Any),
                "/config/container_limits.json"
            ),
            &name
        ));
    }

    #[test]
    fn test_watch_dir() {
        assert_eq!(watch_dir(Path::new("/config/limits.json")), PathBuf::from("/config"));
        assert_eq!(watch_dir(Path::new("limits.json")), PathBuf::from("."));
    }

    #[tokio::test]
    async fn test_start_on_existing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let watcher = StateFileWatcher::new(dir.path().join("limits.json"), ReconcileTrigger::new());
        assert!(watcher.start().is_ok());
    }

    #[test]
    fn test_start_on_missing_directory_fails() {
        let watcher = StateFileWatcher::new("/nonexistent/dir/limits.json", ReconcileTrigger::new());
        assert!(watcher.start().is_err());
    }
}
