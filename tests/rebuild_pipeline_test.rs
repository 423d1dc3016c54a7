//! Integration tests for the watch → dedup → rebuild → publish pipeline,
//! driven by synthetic events and a recording builder.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use notify::event::{CreateKind, DataChange, ModifyKind};
use notify::{Event, EventKind};
use tempfile::TempDir;

use sitewatch::builder::{BuildError, Builder};
use sitewatch::config::Settings;
use sitewatch::publish;
use sitewatch::watcher::{RebuildOrchestrator, WatchTree};

/// Builder double that records calls and fakes an output tree.
struct RecordingBuilder {
    calls: Mutex<Vec<&'static str>>,
    output_dir: PathBuf,
}

impl RecordingBuilder {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            output_dir,
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Builder for RecordingBuilder {
    async fn init_project(&self, _source_root: &Path) -> Result<(), BuildError> {
        self.calls.lock().unwrap().push("init");
        Ok(())
    }

    async fn build(&self, _source_root: &Path) -> Result<(), BuildError> {
        let generation = {
            let mut calls = self.calls.lock().unwrap();
            calls.push("build");
            calls.iter().filter(|c| **c == "build").count()
        };
        std::fs::create_dir_all(&self.output_dir).unwrap();
        std::fs::write(
            self.output_dir.join("index.html"),
            format!("<html>build {generation}</html>"),
        )
        .unwrap();
        Ok(())
    }
}

fn modify_event(path: &Path) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
        .add_path(path.to_path_buf())
}

fn create_dir_event(path: &Path) -> Event {
    Event::new(EventKind::Create(CreateKind::Folder)).add_path(path.to_path_buf())
}

struct Pipeline {
    orchestrator: RebuildOrchestrator,
    builder: Arc<RecordingBuilder>,
    settings: Arc<Settings>,
}

fn pipeline(root: &Path) -> Pipeline {
    let settings = Arc::new(Settings {
        source_root: root.to_path_buf(),
        ..Settings::default()
    });
    publish::reset_served_root(&settings.served_root()).unwrap();

    let builder = Arc::new(RecordingBuilder::new(settings.build_output()));
    let (mut tree, events) = WatchTree::new(&settings.watch).unwrap();
    tree.watch_root(root).unwrap();

    let orchestrator =
        RebuildOrchestrator::new(settings.clone(), tree, events, builder.clone());
    Pipeline {
        orchestrator,
        builder,
        settings,
    }
}

#[tokio::test]
async fn content_change_triggers_one_build_and_publish() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::write(root.join("chapter.md"), "content").unwrap();

    let mut p = pipeline(&root);
    p.orchestrator
        .handle_event(modify_event(&root.join("chapter.md")))
        .await
        .unwrap();

    assert_eq!(p.builder.calls(), vec!["build"]);
    assert_eq!(
        std::fs::read_to_string(p.settings.served_root().join("index.html")).unwrap(),
        "<html>build 1</html>"
    );
}

#[tokio::test]
async fn identical_rewrite_does_not_rebuild() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::write(root.join("chapter.md"), "content").unwrap();

    let mut p = pipeline(&root);
    p.orchestrator
        .handle_event(modify_event(&root.join("chapter.md")))
        .await
        .unwrap();

    // Same bytes again: mtime moves, content does not.
    std::fs::write(root.join("chapter.md"), "content").unwrap();
    p.orchestrator
        .handle_event(modify_event(&root.join("chapter.md")))
        .await
        .unwrap();

    assert_eq!(p.builder.calls(), vec!["build"]);
}

#[tokio::test]
async fn distinct_changes_each_rebuild() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::write(root.join("chapter.md"), "one").unwrap();

    let mut p = pipeline(&root);
    p.orchestrator
        .handle_event(modify_event(&root.join("chapter.md")))
        .await
        .unwrap();

    std::fs::write(root.join("chapter.md"), "two").unwrap();
    p.orchestrator
        .handle_event(modify_event(&root.join("chapter.md")))
        .await
        .unwrap();

    assert_eq!(p.builder.calls(), vec!["build", "build"]);
    assert_eq!(
        std::fs::read_to_string(p.settings.served_root().join("index.html")).unwrap(),
        "<html>build 2</html>"
    );
}

#[tokio::test]
async fn manifest_change_initializes_before_building() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::write(root.join("SUMMARY.md"), "# Summary").unwrap();

    let mut p = pipeline(&root);
    p.orchestrator
        .handle_event(modify_event(&root.join("SUMMARY.md")))
        .await
        .unwrap();

    assert_eq!(p.builder.calls(), vec!["init", "build"]);
}

#[tokio::test]
async fn hidden_and_ignored_paths_never_rebuild() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::write(root.join(".hidden.md"), "x").unwrap();
    std::fs::create_dir_all(root.join("node_modules")).unwrap();
    std::fs::write(root.join("node_modules/pkg.json"), "x").unwrap();
    std::fs::create_dir_all(root.join("_book")).unwrap();

    let mut p = pipeline(&root);
    p.orchestrator
        .handle_event(modify_event(&root.join(".hidden.md")))
        .await
        .unwrap();
    p.orchestrator
        .handle_event(create_dir_event(&root.join("node_modules")))
        .await
        .unwrap();
    p.orchestrator
        .handle_event(create_dir_event(&root.join("_book")))
        .await
        .unwrap();

    assert!(p.builder.calls().is_empty());
    assert!(!p.orchestrator.watched_dirs().contains(&root.join("_book")));
    assert!(
        !p.orchestrator
            .watched_dirs()
            .contains(&root.join("node_modules"))
    );
}

#[tokio::test]
async fn vanished_file_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();

    let mut p = pipeline(&root);
    // The event refers to a file that is already gone: a race with deletion,
    // not an error.
    p.orchestrator
        .handle_event(modify_event(&root.join("deleted.md")))
        .await
        .unwrap();

    assert!(p.builder.calls().is_empty());
}

#[tokio::test]
async fn created_directory_with_children_is_armed_and_detected() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();

    let mut p = pipeline(&root);

    // A directory with a nested file appears in one atomic move; only the
    // top-level creation event is delivered.
    std::fs::create_dir_all(root.join("imported/nested")).unwrap();
    std::fs::write(root.join("imported/nested/page.md"), "content").unwrap();
    p.orchestrator
        .handle_event(create_dir_event(&root.join("imported")))
        .await
        .unwrap();

    assert!(p.orchestrator.watched_dirs().contains(&root.join("imported")));
    assert!(
        p.orchestrator
            .watched_dirs()
            .contains(&root.join("imported/nested"))
    );
    // Structural change alone must not rebuild.
    assert!(p.builder.calls().is_empty());

    // A subsequent modification of the nested file is detected.
    p.orchestrator
        .handle_event(modify_event(&root.join("imported/nested/page.md")))
        .await
        .unwrap();
    assert_eq!(p.builder.calls(), vec!["build"]);
}

#[tokio::test]
async fn initial_build_publishes_before_any_event() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();

    let p = pipeline(&root);
    p.orchestrator.initial_build().await.unwrap();

    assert_eq!(p.builder.calls(), vec!["build"]);
    assert!(p.settings.served_root().join("index.html").exists());
}

/// Failing builder double.
struct FailingBuilder;

#[async_trait]
impl Builder for FailingBuilder {
    async fn init_project(&self, _source_root: &Path) -> Result<(), BuildError> {
        unreachable!("init is only invoked for manifest changes")
    }

    async fn build(&self, source_root: &Path) -> Result<(), BuildError> {
        Err(BuildError::Spawn {
            command: "gitbook build".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no builder in {}", source_root.display()),
            ),
        })
    }
}

#[tokio::test]
async fn builder_failure_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::write(root.join("chapter.md"), "content").unwrap();

    let settings = Arc::new(Settings {
        source_root: root.clone(),
        ..Settings::default()
    });
    publish::reset_served_root(&settings.served_root()).unwrap();
    let (mut tree, events) = WatchTree::new(&settings.watch).unwrap();
    tree.watch_root(&root).unwrap();
    let mut orchestrator =
        RebuildOrchestrator::new(settings, tree, events, Arc::new(FailingBuilder));

    let err = orchestrator
        .handle_event(modify_event(&root.join("chapter.md")))
        .await
        .unwrap_err();
    assert!(matches!(err, sitewatch::WatchError::Build(_)));
}
