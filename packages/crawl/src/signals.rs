//! Shutdown signal handling.
//!
//! The first SIGINT or SIGTERM cancels the run's token. Later signals are
//! ignored; the crawl drains on its own once every wait has observed the
//! cancellation.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns a task that cancels `token` on the first termination signal.
///
/// The task also exits quietly if `token` is cancelled by other means.
#[must_use]
pub fn spawn_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = wait_for_termination() => {
                log::warn!("Shutdown requested, finishing cached tasks and skipping the rest");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    })
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = wait_for_sigterm() => {}
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            log::warn!("Failed to register SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
