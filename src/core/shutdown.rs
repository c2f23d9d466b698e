//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves on the first of:
//! - unix: `SIGINT`, `SIGTERM`, `SIGQUIT`;
//! - elsewhere: Ctrl-C.

/// Waits until the process is asked to terminate.
///
/// Listeners are installed per call. Fails only if installation fails.
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;

        tokio::select! {
            _ = interrupt.recv() => {},
            _ = terminate.recv() => {},
            _ = quit.recv() => {},
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
