//! Alert retention.
//!
//! Read alerts older than the retention period are deleted, then every
//! recipient is trimmed to a fixed number of newest alerts. Unread alerts
//! are only ever removed by the trim.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::store::AlertStore;

const DEFAULT_RETENTION_DAYS: i64 = 30;
const DEFAULT_MAX_ALERTS_PER_RECIPIENT: i64 = 500;
const DEFAULT_CLEANUP_INTERVAL_HOURS: u64 = 24;
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub retention_days: i64,
    pub max_per_recipient: i64,
    pub interval: Duration,
}

impl RetentionConfig {
    /// | Variable                   | Default |
    /// |----------------------------|---------|
    /// | `RETENTION_DAYS`           | `30`    |
    /// | `MAX_ALERTS_PER_RECIPIENT` | `500`   |
    /// | `CLEANUP_INTERVAL_HOURS`   | `24`    |
    ///
    /// A zero interval falls back to the default.
    pub fn from_env() -> Self {
        Self {
            retention_days: std::env::var("RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            max_per_recipient: std::env::var("MAX_ALERTS_PER_RECIPIENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_ALERTS_PER_RECIPIENT),
            interval: Duration::from_secs(
                std::env::var("CLEANUP_INTERVAL_HOURS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|hours| *hours > 0)
                    .unwrap_or(DEFAULT_CLEANUP_INTERVAL_HOURS)
                    * 3600,
            ),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            max_per_recipient: DEFAULT_MAX_ALERTS_PER_RECIPIENT,
            interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_HOURS * 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_deleted: u64,
    pub overflow_trimmed: u64,
}

pub struct RetentionSweep {
    store: Arc<dyn AlertStore>,
    config: RetentionConfig,
}

impl RetentionSweep {
    pub fn new(store: Arc<dyn AlertStore>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.retention_days);
        let expired_deleted = self.store.delete_read_older_than(cutoff).await?;
        let overflow_trimmed = self
            .store
            .trim_per_recipient(self.config.max_per_recipient)
            .await?;
        Ok(SweepReport {
            expired_deleted,
            overflow_trimmed,
        })
    }

    /// Sweep on a fixed interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.config.interval.max(MIN_SWEEP_INTERVAL);
        tracing::info!(
            retention_days = self.config.retention_days,
            max_per_recipient = self.config.max_per_recipient,
            interval_secs = period.as_secs(),
            "Alert retention job started",
        );
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Alert retention job stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.expired_deleted + report.overflow_trimmed > 0 => {
                            tracing::info!(
                                expired_deleted = report.expired_deleted,
                                overflow_trimmed = report.overflow_trimmed,
                                "Alert retention: purged alerts",
                            );
                        }
                        Ok(_) => tracing::debug!("Alert retention: nothing to purge"),
                        Err(e) => tracing::error!(error = %e, "Alert retention: sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_core::types::DbId;
    use fleetwatch_db::models::alert::NewAlert;

    use crate::memory::MemoryBackend;

    async fn insert(store: &MemoryBackend, recipient_id: DbId) -> DbId {
        store
            .insert_deduped(NewAlert {
                recipient_id,
                kind: "user_role_changed".into(),
                category: "info".into(),
                priority: "low".into(),
                title: "Role changed".into(),
                message: "Your role has been changed to manager".into(),
                metadata: serde_json::json!({}),
                action_url: None,
                dedup_key: None,
            })
            .await
            .unwrap()
            .unwrap()
            .id
    }

    fn store() -> Arc<MemoryBackend> {
        let store = Arc::new(MemoryBackend::new());
        store.add_recipients([1, 2]);
        store
    }

    #[tokio::test]
    async fn old_read_alerts_go_old_unread_stay() {
        let store = store();
        let read = insert(&store, 1).await;
        let unread = insert(&store, 1).await;
        store.mark_read(1, read).await.unwrap();
        store.backdate(read, chrono::Duration::days(40));
        store.backdate(unread, chrono::Duration::days(40));

        let sweep = RetentionSweep::new(store.clone(), RetentionConfig::default());
        let report = sweep.sweep_once().await.unwrap();

        assert_eq!(report.expired_deleted, 1);
        let left: Vec<DbId> = store.alerts().iter().map(|a| a.id).collect();
        assert_eq!(left, vec![unread]);
    }

    #[tokio::test]
    async fn trim_keeps_newest_per_recipient() {
        let store = store();
        for _ in 0..5 {
            insert(&store, 1).await;
        }
        insert(&store, 2).await;

        let sweep = RetentionSweep::new(
            store.clone(),
            RetentionConfig {
                max_per_recipient: 3,
                ..RetentionConfig::default()
            },
        );
        let report = sweep.sweep_once().await.unwrap();

        assert_eq!(report.overflow_trimmed, 2);
        let ids: Vec<DbId> = store
            .alerts()
            .iter()
            .filter(|a| a.recipient_id == 1)
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(store.alerts().iter().filter(|a| a.recipient_id == 2).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let store = store();
        let sweep = Arc::new(RetentionSweep::new(
            store,
            RetentionConfig {
                interval: Duration::ZERO,
                ..RetentionConfig::default()
            },
        ));
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let sweep = Arc::clone(&sweep);
            let cancel = cancel.clone();
            async move { sweep.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        task.await.unwrap();
    }
}
