// src/watch/debounce.rs

//! Burst coalescing for filesystem events.
//!
//! The first qualifying event of a burst starts one timer task. Later events
//! only move `last_activity` forward. The timer emits a single
//! [`RebuildSignal`] once the tree has been quiet for `quiet`, or once
//! `max_wait` has passed since the burst started, whichever comes first.
//! Events that arrive while that signal waits for the receiver are held back
//! and form the next burst, timed from the first of them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(2);

/// Timing parameters for the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Idle time after the last event before a rebuild fires.
    pub quiet: Duration,
    /// Upper bound measured from the first event of a burst.
    pub max_wait: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet: DEFAULT_QUIET_WINDOW,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// One coalesced "please rebuild" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSignal {
    /// Number of qualifying events folded into this signal.
    pub events: usize,
    /// Time from the first event of the burst to emission.
    pub burst: Duration,
}

#[derive(Debug)]
struct DebounceState {
    pending: bool,
    /// The cycle has fired and is handing its signal to the receiver.
    delivering: bool,
    last_activity: Instant,
    burst_start: Instant,
    events: usize,
    /// First event recorded while delivering, and how many followed.
    next_burst: Option<(Instant, usize)>,
}

impl DebounceState {
    fn deadline(&self, config: &DebounceConfig) -> Instant {
        (self.last_activity + config.quiet).min(self.burst_start + config.max_wait)
    }
}

/// Shared handle to the debounce state machine.
///
/// Cloning is cheap; all clones feed the same burst. `record_activity` may be
/// called from any task.
#[derive(Debug, Clone)]
pub struct Debouncer {
    config: DebounceConfig,
    state: Arc<Mutex<DebounceState>>,
    in_flight: Arc<Mutex<Option<JoinHandle<()>>>>,
    tx: mpsc::Sender<RebuildSignal>,
    cancel: CancellationToken,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Debouncer {
    pub fn new(
        config: DebounceConfig,
        tx: mpsc::Sender<RebuildSignal>,
        cancel: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            config,
            state: Arc::new(Mutex::new(DebounceState {
                pending: false,
                delivering: false,
                last_activity: now,
                burst_start: now,
                events: 0,
                next_burst: None,
            })),
            in_flight: Arc::new(Mutex::new(None)),
            tx,
            cancel,
        }
    }

    pub fn config(&self) -> DebounceConfig {
        self.config
    }

    /// Whether a debounce cycle is currently in flight.
    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending
    }

    /// Record one qualifying event.
    ///
    /// Returns `true` if this event opened a new burst (and spawned its
    /// timer), `false` if it was folded into the pending one.
    pub fn record_activity(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let now = Instant::now();
        {
            let mut state = lock(&self.state);
            state.last_activity = now;
            if state.pending {
                if state.delivering {
                    let next = state.next_burst.get_or_insert((now, 0));
                    next.1 += 1;
                    trace!(events = next.1, "event held for the burst after delivery");
                } else {
                    state.events += 1;
                    trace!(events = state.events, "event folded into pending burst");
                }
                return false;
            }
            state.pending = true;
            state.burst_start = now;
            state.events = 1;
        }

        debug!("starting debounce cycle");
        let handle = tokio::spawn(run_cycle(
            self.config,
            Arc::clone(&self.state),
            self.tx.clone(),
            self.cancel.clone(),
        ));
        *lock(&self.in_flight) = Some(handle);
        true
    }

    /// Wait for the in-flight timer task (if any) to finish.
    ///
    /// Cancel the token first to make this return promptly.
    pub async fn join(&self) {
        let handle = lock(&self.in_flight).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                debug!(error = %err, "debounce timer task ended abnormally");
            }
        }
    }
}

async fn run_cycle(
    config: DebounceConfig,
    state: Arc<Mutex<DebounceState>>,
    tx: mpsc::Sender<RebuildSignal>,
    cancel: CancellationToken,
) {
    loop {
        let deadline = lock(&state).deadline(&config);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("debounce cycle cancelled");
                lock(&state).pending = false;
                return;
            }
            _ = sleep_until(deadline) => {}
        }

        let signal = {
            let mut s = lock(&state);
            let now = Instant::now();
            let idle = now.saturating_duration_since(s.last_activity);
            let burst = now.saturating_duration_since(s.burst_start);
            if idle >= config.quiet || burst >= config.max_wait {
                s.delivering = true;
                Some(RebuildSignal {
                    events: s.events,
                    burst,
                })
            } else {
                None
            }
        };

        let Some(signal) = signal else {
            // More activity arrived; wait again.
            continue;
        };

        debug!(events = signal.events, burst = ?signal.burst, "debounce window closed");
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("debounce cycle cancelled while delivering rebuild signal");
                let mut s = lock(&state);
                s.pending = false;
                s.delivering = false;
                s.next_burst = None;
                return;
            }
            res = tx.send(signal) => {
                if res.is_err() {
                    debug!("rebuild receiver dropped; signal discarded");
                }
            }
        }

        let mut s = lock(&state);
        s.delivering = false;
        if let Some((first, events)) = s.next_burst.take() {
            // Events recorded during delivery open the next burst.
            s.burst_start = first;
            s.events = events;
            trace!(events, "activity during delivery; continuing cycle");
            continue;
        }
        s.pending = false;
        return;
    }
}
