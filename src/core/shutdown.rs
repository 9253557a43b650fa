//! # Cross-platform OS signal handling.
//!
//! Provides [`wait_for_os_signal`], an async helper that completes when the process
//! receives a termination signal and reports which one, as the [`Signal`] key the pod
//! publishes to its beans.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal) → [`Signal::INTERRUPT`]
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes) → [`Signal::TERMINATE`]
//! - `SIGQUIT` → [`Signal::QUIT`]
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → [`Signal::INTERRUPT`]

use crate::signals::Signal;

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns the received signal, or `Err` if signal registration fails.
#[cfg(unix)]
pub(crate) async fn wait_for_os_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        _ = sigint.recv()  => Signal::INTERRUPT,
        _ = sigterm.recv() => Signal::TERMINATE,
        _ = sigquit.recv() => Signal::QUIT,
    };
    Ok(received)
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns the received signal, or `Err` if signal registration fails.
#[cfg(not(unix))]
pub(crate) async fn wait_for_os_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    Ok(Signal::INTERRUPT)
}
