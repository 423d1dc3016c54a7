//! The rebuild orchestration loop.
//!
//! Single consumer of the raw event stream: filters noise, deduplicates by
//! content fingerprint, invokes the external builder, and publishes the
//! output tree. The loop is strictly sequential: a build in flight blocks
//! it for the build's full duration, so bursts of change events queue in the
//! channel instead of triggering overlapping builds. Events are processed in
//! the order the backend delivered them; there is no coalescing window.

use std::path::Path;
use std::sync::Arc;

use notify::{Event, EventKind};
use tokio::sync::mpsc;

use crate::builder::Builder;
use crate::config::Settings;
use crate::fingerprint::FingerprintCache;
use crate::publish;

use super::error::WatchError;
use super::tree::WatchTree;

pub struct RebuildOrchestrator {
    settings: Arc<Settings>,
    tree: WatchTree,
    events: mpsc::Receiver<notify::Result<Event>>,
    builder: Arc<dyn Builder>,
    fingerprints: FingerprintCache,
}

impl RebuildOrchestrator {
    pub fn new(
        settings: Arc<Settings>,
        tree: WatchTree,
        events: mpsc::Receiver<notify::Result<Event>>,
        builder: Arc<dyn Builder>,
    ) -> Self {
        Self {
            settings,
            tree,
            events,
            builder,
            fingerprints: FingerprintCache::new(),
        }
    }

    /// Build and publish once, without waiting for an event. Runs at startup
    /// so the served tree is never empty.
    pub async fn initial_build(&self) -> Result<(), WatchError> {
        self.rebuild().await
    }

    /// Consume events until the source goes away.
    ///
    /// A closed channel or a backend-reported error means the notification
    /// source is gone; the pipeline cannot continue without it, so the error
    /// propagates and the process exits.
    pub async fn run(mut self) -> Result<(), WatchError> {
        crate::log_event!("orchestrator", "started");
        loop {
            let Some(res) = self.events.recv().await else {
                return Err(WatchError::ChannelClosed);
            };
            let event = res.map_err(|e| WatchError::EventError {
                details: e.to_string(),
            })?;
            self.handle_event(event).await?;
        }
    }

    /// Process one raw filesystem event.
    ///
    /// Recoverable conditions (ignored names, vanished files, unchanged
    /// content) are skipped; builder and publisher failures propagate.
    pub async fn handle_event(&mut self, event: Event) -> Result<(), WatchError> {
        for path in &event.paths {
            self.handle_path(&event.kind, path).await?;
        }
        Ok(())
    }

    async fn handle_path(&mut self, kind: &EventKind, path: &Path) -> Result<(), WatchError> {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(());
        };
        if self.settings.watch.is_ignored_file(name) {
            crate::debug_event!("orchestrator", "ignored", "{}", path.display());
            return Ok(());
        }

        // The event may outlive its subject: a path already gone by the time
        // we get here is a race with deletion, not an error.
        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => {
                crate::debug_event!("orchestrator", "vanished", "{}", path.display());
                return Ok(());
            }
        };

        if meta.is_dir() {
            // Structural changes alone never trigger a rebuild, but new
            // directories must be armed before files appear inside them.
            if matches!(kind, EventKind::Create(_)) {
                self.tree.on_directory_created(path);
            }
            return Ok(());
        }

        match self.fingerprints.has_changed(path) {
            Some(true) => {}
            Some(false) => {
                crate::log_event!("orchestrator", "unchanged", "{}", path.display());
                return Ok(());
            }
            None => {
                crate::debug_event!("orchestrator", "unreadable, skipped", "{}", path.display());
                return Ok(());
            }
        }

        crate::log_event!("orchestrator", "changed", "{}", path.display());

        // A manifest change implies the project structure moved, which needs
        // re-scaffolding before the content build.
        if name == self.settings.builder.manifest {
            self.builder.init_project(&self.settings.source_root).await?;
        }

        self.rebuild().await
    }

    /// Run a full build and publish the output tree.
    async fn rebuild(&self) -> Result<(), WatchError> {
        self.builder.build(&self.settings.source_root).await?;
        publish::publish(&self.settings.build_output(), &self.settings.served_root())?;
        crate::log_event!(
            "orchestrator",
            "published",
            "{}",
            self.settings.served_root().display()
        );
        Ok(())
    }

    /// Directories currently subscribed. Exposed for integration tests.
    pub fn watched_dirs(&self) -> &std::collections::HashSet<std::path::PathBuf> {
        self.tree.watched_dirs()
    }
}
