//! Dynamic recursive directory watching.
//!
//! Notification backends deliver events only for directories that were
//! explicitly subscribed, and most do not recurse into directories created
//! after the watch was established. The tree therefore re-arms itself: an
//! initial walk subscribes every accepted directory under the root, and the
//! orchestrator calls [`WatchTree::on_directory_created`] whenever a new
//! directory appears so that trees moved into place with pre-existing
//! children are picked up without a missed-subscription window.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::WatchConfig;

use super::error::WatchError;

/// Maintains the set of subscribed directories.
///
/// Membership only grows. Deleted directories are tolerated: their stale
/// subscriptions simply stop producing events.
pub struct WatchTree {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
    config: WatchConfig,
}

impl WatchTree {
    /// Create a watch tree and the raw event stream it feeds.
    ///
    /// The stream carries events exactly as the backend delivers them, in
    /// order, to a single consumer.
    pub fn new(
        config: &WatchConfig,
    ) -> Result<(Self, mpsc::Receiver<notify::Result<Event>>), WatchError> {
        let (tx, rx) = mpsc::channel(256);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok((
            Self {
                watcher,
                watched: HashSet::new(),
                config: config.clone(),
            },
            rx,
        ))
    }

    /// Subscribe the root and every accepted directory beneath it.
    ///
    /// An unreadable or unwatchable root is fatal; failures on individual
    /// subdirectories are logged and skipped.
    pub fn watch_root(&mut self, root: &Path) -> Result<(), WatchError> {
        let root = root
            .canonicalize()
            .map_err(|e| WatchError::ScanFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.add_watch(&root)?;
        self.arm_subtree(&root);
        crate::log_event!("watcher", "watching", "{} directories", self.watched.len());
        Ok(())
    }

    /// Re-arm after a directory-created event.
    ///
    /// Subscribes `path` and walks beneath it for directories created
    /// atomically with it (e.g. a tree moved into place). Individual
    /// subscription failures are logged and skipped; they do not abort the
    /// walk.
    pub fn on_directory_created(&mut self, path: &Path) {
        let accepted = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| !self.config.is_ignored_dir(name));
        if !accepted {
            crate::debug_event!("watcher", "ignored directory", "{}", path.display());
            return;
        }

        if let Err(e) = self.add_watch(path) {
            tracing::warn!("[watcher] {e}");
            return;
        }
        self.arm_subtree(path);
    }

    /// Walk directories below `root` and subscribe each accepted one.
    fn arm_subtree(&mut self, root: &Path) {
        let config = self.config.clone();
        let walk = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| !config.is_ignored_dir(name))
            })
            .build();

        for entry in walk {
            match entry {
                Ok(e) if e.depth() > 0 && e.file_type().is_some_and(|ft| ft.is_dir()) => {
                    if let Err(err) = self.add_watch(e.path()) {
                        tracing::warn!("[watcher] {err}");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("[watcher] scan error: {e}"),
            }
        }
    }

    fn add_watch(&mut self, dir: &Path) -> Result<(), WatchError> {
        if self.watched.contains(dir) {
            return Ok(());
        }
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.watched.insert(dir.to_path_buf());
        crate::debug_event!("watcher", "watching", "{}", dir.display());
        Ok(())
    }

    /// Directories currently subscribed.
    pub fn watched_dirs(&self) -> &HashSet<PathBuf> {
        &self.watched
    }
}
