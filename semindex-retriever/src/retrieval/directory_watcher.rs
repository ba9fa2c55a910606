//! Filesystem watching for workspace roots.
//!
//! Raw notify events are lightly debounced by `notify-debouncer-mini` on its
//! own thread and forwarded as paths into a flume channel, which a
//! [`ReindexDebouncer`](super::debouncer::ReindexDebouncer) drains.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};

use super::file_scanner::{is_excluded_path, relative_to_roots};

/// Window used to merge the duplicate events a single save produces
const EVENT_COALESCE_WINDOW: Duration = Duration::from_millis(200);

/// Keeps the underlying watcher alive; dropping it stops the events.
pub struct DirectoryWatcher {
    roots: Vec<PathBuf>,
    _debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("roots", &self.roots)
            .finish()
    }
}

impl DirectoryWatcher {
    /// Watch every root recursively, sending changed paths into `events`.
    pub fn watch(roots: &[PathBuf], events: flume::Sender<PathBuf>) -> Result<Self> {
        let watched = roots.to_vec();
        let mut debouncer = new_debouncer(EVENT_COALESCE_WINDOW, move |res: DebounceEventResult| {
            match res {
                Ok(batch) => {
                    for event in batch {
                        if !should_forward(&watched, &event.path) {
                            continue;
                        }
                        // The receiver is gone once the watch loop shuts down
                        if events.send(event.path).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!("File watcher error: {}", e),
            }
        })
        .context("Failed to create file watcher")?;

        for root in roots {
            debouncer
                .watcher()
                .watch(root, notify::RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {}", root.display()))?;
            tracing::info!("Watching {}", root.display());
        }

        Ok(Self {
            roots: roots.to_vec(),
            _debouncer: debouncer,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Cache writes and build output would otherwise trigger endless reindexing.
/// Directories are forwarded too: a rename is reported only as its two
/// directory paths.
fn should_forward(roots: &[PathBuf], path: &Path) -> bool {
    let relative = relative_to_roots(roots, path).unwrap_or(path);
    !is_excluded_path(relative)
}
