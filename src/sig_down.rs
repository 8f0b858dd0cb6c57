//! Graceful shutdown on SIGINT and SIGTERM.

use tokio_util::sync::CancellationToken;

/// Cancels a shared token when the process is asked to stop.
///
/// Every [`cancellation_token`](Self::cancellation_token) is a child of the same root, so
/// the HTTP server and background tasks stop together.
#[derive(Debug)]
pub struct SigDown {
    token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers. Must be called inside a Tokio runtime.
    pub fn try_new() -> std::io::Result<Self> {
        let token = CancellationToken::new();

        #[cfg(unix)]
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        let trigger = token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down"),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received Ctrl-C, shutting down");
            }
            trigger.cancel();
        });

        Ok(Self { token })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
