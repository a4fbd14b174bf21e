use crate::services::storage::TempStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Periodically removes temp files orphaned by crashed requests.
///
/// Normal requests delete their own files through the cleanup tracker; this
/// only catches what a crash or kill left behind.
pub struct BackgroundWorker {
    storage: Arc<TempStorage>,
    interval: Duration,
    stale_after: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        storage: Arc<TempStorage>,
        interval_secs: u64,
        stale_after_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(interval_secs),
            stale_after: Duration::from_secs(stale_after_secs),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn sweep(&self) {
        tracing::info!("🧹 Sweeping stale temp files...");
        match self.storage.sweep_stale(self.stale_after).await {
            Ok(0) => tracing::debug!("No stale temp files found"),
            Ok(removed) => tracing::info!("Removed {} stale temp files", removed),
            Err(e) => tracing::error!("Stale-file sweep failed: {}", e),
        }
    }
}
