//! Input folder watching.

use super::scanner::InputFilter;
use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Paths of newly arrived input files.
pub struct DirectoryWatcher {
    // Dropping the watcher stops notifications.
    _watcher: RecommendedWatcher,
    arrivals: mpsc::UnboundedReceiver<PathBuf>,
}

impl DirectoryWatcher {
    /// Start watching `dir` (non-recursive).
    pub fn start(dir: &Path, filter: InputFilter) -> Result<Self> {
        let (tx, arrivals) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in arrived_paths(&event, &filter) {
                        if tx.send(path).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .context("Failed to create folder watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch folder: {}", dir.display()))?;

        info!("Watching {} for new files", dir.display());

        Ok(Self {
            _watcher: watcher,
            arrivals,
        })
    }

    /// Next arrived path. `None` once the watcher has shut down.
    pub async fn next_path(&mut self) -> Option<PathBuf> {
        self.arrivals.recv().await
    }
}

/// Paths in a watch event that count as a new input file: created files,
/// and files renamed into the folder.
pub fn arrived_paths(event: &Event, filter: &InputFilter) -> Vec<PathBuf> {
    let paths: Vec<&PathBuf> = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().collect()
        }
        // Both ends of a rename in one event: only the destination arrived.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1).into_iter().collect()
        }
        _ => Vec::new(),
    };

    paths
        .into_iter()
        .filter(|path| {
            let keep = filter.matches(path);
            if !keep {
                debug!("Ignoring {}", path.display());
            }
            keep
        })
        .cloned()
        .collect()
}
