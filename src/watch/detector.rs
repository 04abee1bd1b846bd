// src/watch/detector.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::debounce::{Debouncer, RebuildSignal};
use crate::watch::event::FsChange;
use crate::watch::event_handler::process_file_change;
use crate::watch::patterns::WatchSpec;
use crate::watch::registry::{
    DirectoryWatcher, NotifyDirectoryWatcher, WatchedDirectorySet, WatchedDirs,
};
use crate::watch::walker::register_tree;

/// Running file-change detector.
///
/// Owns the event-processing task, which in turn owns the OS watcher and the
/// debouncer. Rebuild notifications are read with [`ChangeDetector::next_rebuild`].
/// Dropping the detector cancels it; [`ChangeDetector::stop`] additionally
/// waits for the background tasks to finish.
pub struct ChangeDetector {
    root: PathBuf,
    rebuild_rx: mpsc::Receiver<RebuildSignal>,
    watched: WatchedDirs,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("root", &self.root)
            .field("watched", &self.watched.len())
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ChangeDetector {
    /// Start watching `spec.root()` with the platform's notification backend.
    ///
    /// Fails if any non-ignored directory cannot be registered.
    pub fn start(spec: WatchSpec) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<FsChange>();
        let watcher = NotifyDirectoryWatcher::new(event_tx)?;
        Self::start_with(spec, Arc::new(RealFileSystem), Box::new(watcher), event_rx)
    }

    /// Start with an explicit filesystem, directory watcher and event source.
    ///
    /// `events` must carry the changes produced for directories registered
    /// through `watcher`.
    pub fn start_with(
        spec: WatchSpec,
        fs: Arc<dyn FileSystem>,
        watcher: Box<dyn DirectoryWatcher>,
        events: mpsc::UnboundedReceiver<FsChange>,
    ) -> Result<Self> {
        // Canonicalize once so we have a stable base path.
        let root = fs
            .canonicalize(spec.root())
            .unwrap_or_else(|_| spec.root().to_path_buf());
        let spec = spec.rooted_at(root.clone());

        let mut registry = WatchedDirectorySet::new(watcher);
        let registered = register_tree(fs.as_ref(), &spec, &root, &mut registry)?;
        info!(root = ?root, dirs = registered, "file watcher started");

        // Capacity 1: the debounce cycle, not the queue, absorbs bursts.
        let (rebuild_tx, rebuild_rx) = mpsc::channel::<RebuildSignal>(1);
        let cancel = CancellationToken::new();
        let debouncer = Debouncer::new(spec.debounce(), rebuild_tx, cancel.clone());
        let watched = registry.view();

        let task = tokio::spawn(event_loop(
            spec,
            fs,
            registry,
            debouncer,
            events,
            cancel.clone(),
        ));

        Ok(Self {
            root,
            rebuild_rx,
            watched,
            cancel,
            task: Some(task),
        })
    }

    /// Canonical watch root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the directories currently registered.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched.snapshot()
    }

    pub fn is_watching(&self, dir: &Path) -> bool {
        self.watched.contains(dir)
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the next rebuild notification.
    ///
    /// Returns `None` once the detector has been stopped.
    pub async fn next_rebuild(&mut self) -> Option<RebuildSignal> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            signal = self.rebuild_rx.recv() => signal,
        }
    }

    /// Stop watching and wait for the background tasks to exit.
    ///
    /// Safe to call any number of times.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.rebuild_rx.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "watcher task ended abnormally");
            }
            info!(root = ?self.root, "stopped file watcher");
        }
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn event_loop(
    spec: WatchSpec,
    fs: Arc<dyn FileSystem>,
    mut registry: WatchedDirectorySet,
    debouncer: Debouncer,
    mut events: mpsc::UnboundedReceiver<FsChange>,
    cancel: CancellationToken,
) {
    loop {
        let change = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            change = events.recv() => match change {
                Some(change) => change,
                None => {
                    debug!("filesystem event channel closed");
                    break;
                }
            },
        };

        trace!(?change, "received filesystem event");
        let outcome = process_file_change(&change, &spec, fs.as_ref(), &mut registry, &debouncer);
        trace!(?outcome, path = ?change.path, "processed filesystem event");
    }

    debouncer.join().await;
    // Dropping the registry releases the OS watches.
    drop(registry);
    debug!("watcher event loop finished");
}
