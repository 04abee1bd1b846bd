mod common;
use crate::common::{TestResult, eventually, init_tracing};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use hotloop::errors::HotloopError;
use hotloop::fs::mock::MockFileSystem;
use hotloop::watch::{ChangeDetector, ChangeKind, FsChange, IgnoreSet, WatchSpec, ExtensionFilter};
use hotloop_test_utils::fakes::RecordingWatcher;

struct Harness {
    fs: MockFileSystem,
    registered: Arc<Mutex<BTreeSet<PathBuf>>>,
    events: mpsc::UnboundedSender<FsChange>,
    detector: ChangeDetector,
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.go", "package main");
    fs.add_file("/proj/go.mod", "module example.com/proj");
    fs.add_file("/proj/README.md", "# proj");
    fs.add_file("/proj/internal/api/handler.go", "package api");
    fs.add_file("/proj/vendor/github.com/lib/lib.go", "package lib");
    fs.add_file("/proj/node_modules/pkg/index.json", "{}");
    fs.add_file("/proj/.git/HEAD", "ref: refs/heads/main");
    fs.add_file("/proj/temp/app", "binary");
    fs.add_file("/proj/server.log", "started");
    fs
}

fn start(fs: MockFileSystem, spec: WatchSpec, watcher: RecordingWatcher) -> hotloop::errors::Result<Harness> {
    let registered = watcher.watched();
    let (events, rx) = mpsc::unbounded_channel();
    let detector = ChangeDetector::start_with(spec, Arc::new(fs.clone()), Box::new(watcher), rx)?;
    Ok(Harness {
        fs,
        registered,
        events,
        detector,
    })
}

fn start_default() -> Harness {
    start(project(), WatchSpec::with_defaults("/proj"), RecordingWatcher::new()).expect("detector starts")
}

fn paths(dirs: &[&str]) -> Vec<PathBuf> {
    dirs.iter().map(PathBuf::from).collect()
}

async fn expect_no_rebuild(detector: &mut ChangeDetector) {
    assert!(
        timeout(Duration::from_secs(3), detector.next_rebuild()).await.is_err(),
        "unexpected rebuild"
    );
}

#[tokio::test(start_paused = true)]
async fn initial_walk_skips_ignored_directories() -> TestResult {
    init_tracing();
    let mut h = start_default();

    let expected = paths(&["/proj", "/proj/internal", "/proj/internal/api"]);
    assert_eq!(h.detector.watched_dirs(), expected);
    assert_eq!(h.registered.lock().unwrap().iter().cloned().collect::<Vec<_>>(), expected);
    assert!(!h.detector.is_watching(Path::new("/proj/vendor")));
    assert!(!h.detector.is_watching(Path::new("/proj/vendor/github.com")));

    h.detector.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn vendor_changes_never_trigger_rebuilds() -> TestResult {
    let mut h = start_default();

    h.events.send(FsChange::write("/proj/vendor/github.com/lib/lib.go"))?;
    h.events.send(FsChange::write("/proj/node_modules/pkg/index.json"))?;
    h.events.send(FsChange::write("/proj/server.log"))?;
    h.events.send(FsChange::create("/proj/temp/app"))?;
    expect_no_rebuild(&mut h.detector).await;

    h.events.send(FsChange::write("/proj/internal/api/handler.go"))?;
    let signal = timeout(Duration::from_secs(3), h.detector.next_rebuild())
        .await?
        .ok_or("detector stopped")?;
    assert_eq!(signal.events, 1);

    h.detector.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn untracked_and_metadata_changes_are_dropped() -> TestResult {
    let mut h = start_default();

    h.events.send(FsChange::write("/proj/README.md"))?;
    h.events.send(FsChange::new(ChangeKind::Other, "/proj/main.go"))?;
    h.events.send(FsChange::new(ChangeKind::Remove, "/proj/go.mod"))?;
    h.events.send(FsChange::write("/outside/main.go"))?;
    expect_no_rebuild(&mut h.detector).await;

    // Dotfiles count by their name.
    h.fs.add_file("/proj/.env", "PORT=8080");
    h.events.send(FsChange::write("/proj/.env"))?;
    assert!(timeout(Duration::from_secs(3), h.detector.next_rebuild()).await?.is_some());

    h.detector.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn new_directories_are_watched_before_their_files() -> TestResult {
    init_tracing();
    let mut h = start_default();

    h.fs.add_file("/proj/pkg/store/db.go", "package store");
    h.events.send(FsChange::create("/proj/pkg"))?;

    let watched = eventually(Duration::from_secs(1), || {
        h.detector.is_watching(Path::new("/proj/pkg/store"))
    })
    .await;
    assert!(watched, "new subtree was not registered");
    assert!(h.detector.is_watching(Path::new("/proj/pkg")));

    // The directory itself has no tracked extension.
    expect_no_rebuild(&mut h.detector).await;

    h.events.send(FsChange::write("/proj/pkg/store/db.go"))?;
    assert!(timeout(Duration::from_secs(3), h.detector.next_rebuild()).await?.is_some());

    h.detector.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn new_ignored_directories_stay_unwatched() -> TestResult {
    let mut h = start_default();

    h.fs.add_dir("/proj/vendor/golang.org/x");
    h.events.send(FsChange::create("/proj/vendor/golang.org"))?;
    h.fs.add_dir("/proj/cache/node_modules");
    h.events.send(FsChange::create("/proj/cache"))?;

    assert!(
        eventually(Duration::from_secs(1), || h.detector.is_watching(Path::new("/proj/cache"))).await
    );
    assert!(!h.detector.is_watching(Path::new("/proj/vendor/golang.org")));
    assert!(!h.detector.is_watching(Path::new("/proj/cache/node_modules")));

    h.detector.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn renamed_in_directories_are_watched() -> TestResult {
    let mut h = start_default();

    h.fs.add_dir("/proj/cmd");
    h.events.send(FsChange::new(ChangeKind::Rename, "/proj/cmd"))?;
    assert!(eventually(Duration::from_secs(1), || h.detector.is_watching(Path::new("/proj/cmd"))).await);

    h.detector.stop().await;
    Ok(())
}

#[tokio::test]
async fn registration_failure_aborts_start() {
    let watcher = RecordingWatcher::new().failing_on("/proj/internal");
    let err = start(project(), WatchSpec::with_defaults("/proj"), watcher).err();
    match err {
        Some(HotloopError::WatchInit { path, .. }) => assert_eq!(path, PathBuf::from("/proj/internal")),
        other => panic!("expected WatchInit, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn custom_patterns_and_extensions() -> TestResult {
    let spec = WatchSpec::new(
        "/proj",
        IgnoreSet::new(&["internal/*"])?,
        ExtensionFilter::new(&["md"]),
    );
    let mut h = start(project(), spec, RecordingWatcher::new())?;

    // Defaults are replaced, so vendor is now walked and internal is not.
    assert!(h.detector.is_watching(Path::new("/proj/vendor/github.com/lib")));
    assert!(!h.detector.is_watching(Path::new("/proj/internal")));

    h.events.send(FsChange::write("/proj/main.go"))?;
    expect_no_rebuild(&mut h.detector).await;
    h.events.send(FsChange::write("/proj/README.md"))?;
    assert!(timeout(Duration::from_secs(3), h.detector.next_rebuild()).await?.is_some());

    h.detector.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_ends_the_stream() -> TestResult {
    let mut h = start_default();

    h.detector.stop().await;
    h.detector.stop().await;
    assert!(h.detector.is_stopped());
    assert!(h.detector.next_rebuild().await.is_none());

    // Events after stop go nowhere.
    let _ = h.events.send(FsChange::write("/proj/main.go"));
    assert!(h.detector.next_rebuild().await.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_during_pending_cycle_completes() -> TestResult {
    let mut h = start_default();

    h.events.send(FsChange::write("/proj/main.go"))?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    timeout(Duration::from_secs(1), h.detector.stop()).await?;
    assert!(h.detector.next_rebuild().await.is_none());
    Ok(())
}
