use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voiceflow_blob::ObjectStore;
use voiceflow_store::{CleanupRepo, Database};
use voiceflow_telemetry::PipelineMetrics;

/// Deletes expired artifacts on a fixed scan interval.
///
/// This is a poll-based scanner rather than an expiry-notification listener:
/// records persist in the store until a sweep processes them, so a scanner
/// that was down during an expiry picks the record up on its next sweep
/// instead of leaking it. Deletion itself stays best-effort: a failed
/// delete is logged, does not block the record's remaining files, and is
/// not re-attempted once the record is removed.
pub struct CleanupScanner {
    repo: CleanupRepo,
    blob: Arc<dyn ObjectStore>,
    scan_interval: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl CleanupScanner {
    pub fn new(
        db: Database,
        blob: Arc<dyn ObjectStore>,
        scan_interval: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            repo: CleanupRepo::new(db),
            blob,
            scan_interval,
            metrics,
        }
    }

    /// Process every currently-expired record. Returns how many records
    /// were handled.
    pub async fn sweep_once(&self) -> usize {
        let records = match self.repo.expired() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "cleanup scan failed");
                return 0;
            }
        };

        let mut handled = 0;
        for record in records {
            for file in &record.files {
                match self.blob.delete(file).await {
                    Ok(()) => self.metrics.artifact_deleted(),
                    Err(e) => {
                        warn!(job_id = %record.job_id, object = %file, error = %e, "artifact delete failed");
                    }
                }
            }
            if let Err(e) = self.repo.remove(&record.job_id) {
                warn!(job_id = %record.job_id, error = %e, "cleanup record removal failed");
                continue;
            }
            info!(job_id = %record.job_id, files = record.files.len(), "cleanup completed");
            handled += 1;
        }
        handled
    }

    /// Run sweeps until the token is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.scan_interval.as_secs(), "cleanup scanner started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.scan_interval) => {
                        self.sweep_once().await;
                    }
                }
            }
            info!("cleanup scanner stopped");
        })
    }
}
