// src/watch/registry.rs

//! The set of directories registered with the OS notification backend.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::errors::{HotloopError, Result};
use crate::watch::event::{changes_from_event, FsChange};

/// Something that can start delivering events for a single directory.
///
/// The production implementation wraps `notify`; tests use a recorder.
pub trait DirectoryWatcher: Send {
    /// Register `dir` (non-recursively).
    fn watch_dir(&mut self, dir: &Path) -> Result<()>;
}

/// `notify` backed watcher forwarding changes into an unbounded channel.
pub struct NotifyDirectoryWatcher {
    inner: RecommendedWatcher,
}

impl fmt::Debug for NotifyDirectoryWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyDirectoryWatcher").finish()
    }
}

impl NotifyDirectoryWatcher {
    pub fn new(events_tx: mpsc::UnboundedSender<FsChange>) -> Result<Self> {
        // Closure called synchronously by notify whenever an event arrives.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in changes_from_event(event) {
                        if events_tx.send(change).is_err() {
                            // Detector already stopped.
                            trace!("dropping filesystem event after shutdown");
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "file watch error");
                }
            },
            Config::default(),
        )
        .map_err(|source| HotloopError::WatchInit {
            path: PathBuf::new(),
            source,
        })?;

        Ok(Self { inner })
    }
}

impl DirectoryWatcher for NotifyDirectoryWatcher {
    fn watch_dir(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| HotloopError::WatchInit {
                path: dir.to_path_buf(),
                source,
            })
    }
}

/// Read-only view of the watched directories.
#[derive(Debug, Clone, Default)]
pub struct WatchedDirs(Arc<Mutex<BTreeSet<PathBuf>>>);

impl WatchedDirs {
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(dir)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Directories currently registered for notifications, plus the backend that
/// registers them.
///
/// This is the single source of truth for what is being watched. It only
/// grows: the initial walk and newly created directories add to it, and
/// nothing is removed until the detector stops and drops it.
pub struct WatchedDirectorySet {
    watcher: Box<dyn DirectoryWatcher>,
    dirs: WatchedDirs,
}

impl fmt::Debug for WatchedDirectorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedDirectorySet")
            .field("dirs", &self.dirs.len())
            .finish_non_exhaustive()
    }
}

impl WatchedDirectorySet {
    pub fn new(watcher: Box<dyn DirectoryWatcher>) -> Self {
        Self {
            watcher,
            dirs: WatchedDirs::default(),
        }
    }

    /// Register `dir` unless it is already watched.
    ///
    /// Returns `Ok(true)` when the directory was newly added.
    pub fn register(&mut self, dir: &Path) -> Result<bool> {
        if self.dirs.contains(dir) {
            return Ok(false);
        }
        self.watcher.watch_dir(dir)?;
        self.dirs
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir.to_path_buf());
        Ok(true)
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn view(&self) -> WatchedDirs {
        self.dirs.clone()
    }
}
