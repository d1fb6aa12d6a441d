//! Fleetwatch alert dispatch.
//!
//! This crate holds everything between a domain event and the recipient:
//!
//! - [`Notifier`] -- the only write path for alerts (render, dedup, persist,
//!   fan out, email).
//! - [`AlertHub`] -- per-recipient live streams in insertion order.
//! - [`AlertFeed`] -- the recipient-facing read/mutate API.
//! - [`EmailSideChannel`] -- best-effort transactional email.
//! - [`ExpiryScanner`] and [`RetentionSweep`] -- periodic jobs.
//! - [`DomainNotifications`] -- helpers the CRUD screens call after an action.
//! - [`store`] -- the persistence seams, with [`PgBackend`] and
//!   [`MemoryBackend`] implementations.

pub mod actions;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod hub;
pub mod local_alert;
pub mod memory;
pub mod notifier;
pub mod pg;
pub mod retention;
pub mod scanner;
pub mod store;

pub use actions::{DomainEvent, DomainNotifications, DispatchSummary};
pub use delivery::email::{EmailConfig, EmailSideChannel};
pub use error::{NotifyError, StoreError};
pub use feed::AlertFeed;
pub use hub::{AlertHub, FeedEvent, Subscription};
pub use local_alert::{LocalAlert, LocalAlertGate, Toast, ToastBus};
pub use memory::MemoryBackend;
pub use notifier::{Notifier, NotifierConfig, NotifyOutcome};
pub use pg::PgBackend;
pub use retention::{RetentionConfig, RetentionSweep};
pub use scanner::{ExpiryScanner, ScanPhase, ScanReport, ScannerConfig};
