//! Background jobs.
//!
//! Each job is spawned onto the runtime and stops when its
//! [`CancellationToken`] is cancelled. [`BackgroundJobs::shutdown`] cancels
//! them all and waits up to a deadline.

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_events::{ExpiryScanner, RetentionSweep};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct BackgroundJobs {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundJobs {
    /// Start the periodic expiry scan and the retention sweep.
    pub fn start(scanner: Arc<ExpiryScanner>, retention: Arc<RetentionSweep>) -> Self {
        let cancel = CancellationToken::new();

        let scan_cancel = cancel.clone();
        let scan = tokio::spawn(async move { scanner.run(scan_cancel).await });

        let sweep_cancel = cancel.clone();
        let sweep = tokio::spawn(async move { retention.run(sweep_cancel).await });

        tracing::info!("Background jobs started (expiry scan, retention sweep)");

        Self {
            cancel,
            handles: vec![("expiry_scan", scan), ("retention_sweep", sweep)],
        }
    }

    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                tracing::warn!(job = name, "Background job did not stop in time");
            } else {
                tracing::info!(job = name, "Background job stopped");
            }
        }
    }
}
