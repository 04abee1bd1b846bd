// src/signals.rs

//! OS termination signals → shutdown token.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancel `shutdown` on Ctrl-C (and SIGTERM on Unix).
///
/// The task also exits quietly if `shutdown` is cancelled by someone else.
/// If a listener cannot be installed the failure is logged and the token is
/// left alone.
pub fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            received = wait_for_signal() => match received {
                Ok(name) => {
                    info!(signal = name, "termination signal received");
                    shutdown.cancel();
                }
                Err(err) => error!(error = %err, "failed to listen for termination signals"),
            },
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let term = match signal(SignalKind::terminate()) {
        Ok(mut term) => Some(async move {
            term.recv().await;
        }),
        Err(err) => {
            tracing::warn!(error = %err, "cannot listen for SIGTERM; only Ctrl-C will stop hotloop");
            None
        }
    };
    first_signal(tokio::signal::ctrl_c(), term).await
}

/// Whichever of Ctrl-C and SIGTERM arrives first. Without a SIGTERM
/// listener, Ctrl-C alone still ends the wait.
#[cfg(unix)]
async fn first_signal<C, T>(ctrl_c: C, term: Option<T>) -> std::io::Result<&'static str>
where
    C: std::future::Future<Output = std::io::Result<()>>,
    T: std::future::Future<Output = ()>,
{
    match term {
        Some(term) => tokio::select! {
            res = ctrl_c => res.map(|()| "SIGINT"),
            _ = term => Ok("SIGTERM"),
        },
        None => ctrl_c.await.map(|()| "SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
