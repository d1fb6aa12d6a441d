//! Periodic vehicle deadline scan.
//!
//! Each run loads the vehicles with a deadline inside the warning window and
//! raises `vehicle_expiry_warning` / `vehicle_expired` alerts for their
//! assignees. Running the scan twice in one dedup window raises nothing new;
//! the scanner relies on the Notifier's dedup gate for that and keeps no
//! state of its own between runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use fleetwatch_core::expiry::{self, DEFAULT_WARNING_WINDOW_DAYS};
use fleetwatch_core::types::EventData;
use fleetwatch_db::models::vehicle::Vehicle;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::notifier::{Notifier, NotifyOutcome};
use crate::store::FleetRecords;

/// Default time between scheduled scans: once a day.
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 86_400;

/// Shortest period the scheduled loop will tick at.
const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub warning_window_days: i64,
    pub interval: Duration,
}

impl ScannerConfig {
    /// | Variable              | Default |
    /// |-----------------------|---------|
    /// | `EXPIRY_WARNING_DAYS` | `7`     |
    /// | `SCAN_INTERVAL_SECS`  | `86400` |
    ///
    /// A zero or unparsable interval falls back to the default.
    pub fn from_env() -> Self {
        Self {
            warning_window_days: std::env::var("EXPIRY_WARNING_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_WARNING_WINDOW_DAYS),
            interval: Duration::from_secs(
                std::env::var("SCAN_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS),
            ),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            warning_window_days: DEFAULT_WARNING_WINDOW_DAYS,
            interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Scanning,
    Notifying,
}

/// Counters for one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub vehicles_scanned: usize,
    pub alerts_raised: usize,
    pub duplicates_skipped: usize,
    pub unassigned_skipped: usize,
    pub record_failures: usize,
    pub notify_failures: usize,
}

pub struct ExpiryScanner {
    fleet: Arc<dyn FleetRecords>,
    notifier: Arc<Notifier>,
    config: ScannerConfig,
    phase: watch::Sender<ScanPhase>,
    active_runs: AtomicUsize,
}

/// Marks one scan as in flight; the last one out resets the phase to idle.
struct ActiveRun<'a> {
    scanner: &'a ExpiryScanner,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let active_runs = &self.scanner.active_runs;
        self.scanner.phase.send_if_modified(|phase| {
            if active_runs.fetch_sub(1, Ordering::SeqCst) == 1 && *phase != ScanPhase::Idle {
                *phase = ScanPhase::Idle;
                true
            } else {
                false
            }
        });
    }
}

impl ExpiryScanner {
    pub fn new(fleet: Arc<dyn FleetRecords>, notifier: Arc<Notifier>, config: ScannerConfig) -> Self {
        let (phase, _) = watch::channel(ScanPhase::Idle);
        Self {
            fleet,
            notifier,
            config,
            phase,
            active_runs: AtomicUsize::new(0),
        }
    }

    fn begin_run(&self) -> ActiveRun<'_> {
        self.phase.send_modify(|phase| {
            self.active_runs.fetch_add(1, Ordering::SeqCst);
            *phase = ScanPhase::Scanning;
        });
        ActiveRun { scanner: self }
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<ScanPhase> {
        self.phase.subscribe()
    }

    /// Scan against today's date.
    pub async fn run_once(&self) -> Result<ScanReport, StoreError> {
        self.run_for(Utc::now().date_naive()).await
    }

    /// Scan as if today were `today`.
    ///
    /// Fails only when the candidate query fails; a bad record or a failed
    /// notify is counted and skipped.
    ///
    /// Runs may overlap (a manual trigger during a scheduled scan); the phase
    /// goes back to idle only once every run has finished.
    pub async fn run_for(&self, today: NaiveDate) -> Result<ScanReport, StoreError> {
        let _run = self.begin_run();
        let cutoff = expiry::warning_cutoff(today, self.config.warning_window_days);
        let rows = self.fleet.vehicles_due(cutoff).await?;

        self.phase.send_replace(ScanPhase::Notifying);
        let mut report = ScanReport::default();
        for row in rows {
            match row {
                Ok(vehicle) => self.notify_vehicle(&vehicle, today, &mut report).await,
                Err(e) => {
                    report.record_failures += 1;
                    tracing::warn!(error = %e, "Skipping unreadable vehicle record");
                }
            }
        }

        tracing::info!(
            vehicles_scanned = report.vehicles_scanned,
            alerts_raised = report.alerts_raised,
            duplicates_skipped = report.duplicates_skipped,
            record_failures = report.record_failures,
            notify_failures = report.notify_failures,
            "Expiry scan finished",
        );
        Ok(report)
    }

    async fn notify_vehicle(&self, vehicle: &Vehicle, today: NaiveDate, report: &mut ScanReport) {
        report.vehicles_scanned += 1;
        let Some(assignee) = vehicle.assigned_to else {
            report.unassigned_skipped += 1;
            tracing::debug!(vehicle_id = vehicle.id, "Vehicle has no assignee");
            return;
        };

        for (expiry_type, date) in vehicle.expiries() {
            let days = expiry::days_until(date, today);
            let Some(status) = expiry::classify(days, self.config.warning_window_days) else {
                continue;
            };
            let kind = status.event_kind();

            let mut data = EventData::new();
            data.insert("vehicle_id".into(), json!(vehicle.id));
            data.insert("license_plate".into(), json!(vehicle.license_plate));
            data.insert("expiry_type".into(), json!(expiry_type.as_str()));
            data.insert("days_until_expiry".into(), json!(days));
            if let expiry::ExpiryStatus::Warning { days } = status {
                data.insert("days".into(), json!(days));
            }

            match self.notifier.notify(kind, assignee, data).await {
                Ok(NotifyOutcome::Created(_)) => report.alerts_raised += 1,
                Ok(NotifyOutcome::Deduplicated) => report.duplicates_skipped += 1,
                Ok(NotifyOutcome::Ignored) => {}
                Err(e) => {
                    report.notify_failures += 1;
                    tracing::warn!(
                        vehicle_id = vehicle.id,
                        expiry_type = expiry_type.as_str(),
                        error = %e,
                        "Failed to raise expiry alert",
                    );
                }
            }
        }
    }

    /// Scan on a fixed interval until `cancel` fires. The first scan runs
    /// immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.config.interval.max(MIN_SCAN_INTERVAL);
        tracing::info!(
            interval_secs = period.as_secs(),
            warning_window_days = self.config.warning_window_days,
            "Expiry scanner started",
        );
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Expiry scanner stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Expiry scan failed");
                    }
                }
            }
        }
    }
}
