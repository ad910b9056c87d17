//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal;
//! [`cancel_on_signal`] turns that into a `CancellationToken` cancellation
//! so the supervisor loop and the HTTP server stop together.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`. **Elsewhere:** Ctrl-C.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Cancels `token` on the first termination signal.
///
/// If signal handlers cannot be installed the token is left alone and the
/// process keeps running until cancelled some other way.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            res = wait_for_shutdown_signal() => match res {
                Ok(()) => {
                    info!("shutdown requested");
                    token.cancel();
                }
                Err(err) => warn!(error = %err, "cannot install signal handlers"),
            },
        }
    })
}
