//! Test doubles for the build backend, termination provider and OS watcher.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use hotloop::build::{BuildBackend, BuildResult};
use hotloop::errors::{HotloopError, Result};
use hotloop::exec::{ProviderFuture, TerminationProvider};
use hotloop::watch::DirectoryWatcher;

/// A build backend that replays scripted outcomes.
///
/// - `true` → successful build, `false` → `BuildFailed`.
/// - Once the script runs out, every build succeeds.
/// - Each build takes `delay` (tokio time, so paused clocks work).
#[derive(Clone)]
pub struct ScriptedBuilder {
    script: Arc<Mutex<VecDeque<bool>>>,
    builds: Arc<AtomicUsize>,
    starts: Arc<Mutex<Vec<Instant>>>,
    delay: Duration,
}

impl ScriptedBuilder {
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            builds: Arc::new(AtomicUsize::new(0)),
            starts: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn always_ok() -> Self {
        Self::new([])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of builds that ran to completion.
    pub fn builds(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.builds)
    }

    /// Shared list of the instants at which each build began.
    pub fn starts(&self) -> Arc<Mutex<Vec<Instant>>> {
        Arc::clone(&self.starts)
    }
}

impl BuildBackend for ScriptedBuilder {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>> {
        let success = self.script.lock().unwrap().pop_front().unwrap_or(true);
        self.starts.lock().unwrap().push(Instant::now());
        let builds = Arc::clone(&self.builds);
        let delay = self.delay;

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            builds.fetch_add(1, Ordering::SeqCst);
            if success {
                BuildResult::succeeded(delay, "ok\n")
            } else {
                BuildResult::failed(
                    delay,
                    "main.go:7:2: undefined: handler\n",
                    HotloopError::BuildFailed {
                        command: "scripted".to_string(),
                        status: "exit status: 1".to_string(),
                    },
                )
            }
        })
    }
}

/// A call made to [`RecordingTermination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCall {
    Graceful(u32),
    Force(u32),
    FindListeners(u16),
}

/// Termination provider that records every call.
///
/// Signals are forwarded to `inner` when one is set (so real child processes
/// still die); listener lookups always come from the scripted pid list, and a
/// forced kill of a scripted pid removes it from that list.
#[derive(Clone)]
pub struct RecordingTermination {
    inner: Option<Arc<dyn TerminationProvider>>,
    listeners: Arc<Mutex<Vec<u32>>>,
    calls: Arc<Mutex<Vec<TerminationCall>>>,
    reclaim_by_default: bool,
}

impl fmt::Debug for RecordingTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingTermination")
            .field("inner", &self.inner)
            .field("reclaim_by_default", &self.reclaim_by_default)
            .finish_non_exhaustive()
    }
}

impl RecordingTermination {
    /// Record only; signals go nowhere.
    pub fn new() -> Self {
        Self {
            inner: None,
            listeners: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            reclaim_by_default: false,
        }
    }

    /// Record and forward signals to `inner`.
    pub fn wrapping(inner: Arc<dyn TerminationProvider>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new()
        }
    }

    pub fn with_listeners(self, pids: &[u32]) -> Self {
        *self.listeners.lock().unwrap() = pids.to_vec();
        self
    }

    pub fn reclaiming_by_default(mut self, enabled: bool) -> Self {
        self.reclaim_by_default = enabled;
        self
    }

    pub fn calls(&self) -> Vec<TerminationCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn forced(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TerminationCall::Force(pid) => Some(pid),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: TerminationCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for RecordingTermination {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminationProvider for RecordingTermination {
    fn graceful_terminate(&self, pid: u32) -> ProviderFuture<'_, ()> {
        self.record(TerminationCall::Graceful(pid));
        Box::pin(async move {
            match &self.inner {
                Some(inner) => inner.graceful_terminate(pid).await,
                None => Ok(()),
            }
        })
    }

    fn force_kill(&self, pid: u32) -> ProviderFuture<'_, ()> {
        self.record(TerminationCall::Force(pid));
        let scripted = {
            let mut listeners = self.listeners.lock().unwrap();
            let before = listeners.len();
            listeners.retain(|&p| p != pid);
            listeners.len() != before
        };
        Box::pin(async move {
            match &self.inner {
                Some(inner) if !scripted => inner.force_kill(pid).await,
                _ => Ok(()),
            }
        })
    }

    fn find_listeners(&self, port: u16) -> ProviderFuture<'_, Vec<u32>> {
        self.record(TerminationCall::FindListeners(port));
        let pids = self.listeners.lock().unwrap().clone();
        Box::pin(async move { Ok(pids) })
    }

    fn reclaims_ports_by_default(&self) -> bool {
        self.reclaim_by_default
    }
}

/// Directory watcher that only records registrations.
///
/// Registering the path given to [`RecordingWatcher::failing_on`] fails with
/// `WatchInit`.
#[derive(Debug, Clone, Default)]
pub struct RecordingWatcher {
    watched: Arc<Mutex<BTreeSet<PathBuf>>>,
    fail_on: Option<PathBuf>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fail_on = Some(dir.into());
        self
    }

    /// Shared view of everything registered so far.
    pub fn watched(&self) -> Arc<Mutex<BTreeSet<PathBuf>>> {
        Arc::clone(&self.watched)
    }
}

impl DirectoryWatcher for RecordingWatcher {
    fn watch_dir(&mut self, dir: &Path) -> Result<()> {
        if self.fail_on.as_deref() == Some(dir) {
            return Err(HotloopError::WatchInit {
                path: dir.to_path_buf(),
                source: notify::Error::generic("permission denied"),
            });
        }
        self.watched.lock().unwrap().insert(dir.to_path_buf());
        Ok(())
    }
}
