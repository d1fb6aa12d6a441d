use std::sync::Arc;

use fleetwatch_db::DbPool;
use fleetwatch_events::store::{AlertStore, Directory, FleetRecords};
use fleetwatch_events::{
    AlertFeed, AlertHub, DomainNotifications, EmailSideChannel, ExpiryScanner, Notifier,
    NotifierConfig, ScannerConfig, ToastBus,
};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Present when running against PostgreSQL; used by the health check.
    pub pool: Option<DbPool>,
    pub hub: Arc<AlertHub>,
    pub feed: Arc<AlertFeed>,
    pub notifier: Arc<Notifier>,
    pub scanner: Arc<ExpiryScanner>,
    pub domain: Arc<DomainNotifications>,
    pub toasts: Arc<ToastBus>,
    pub ws_manager: Arc<WsManager>,
}

/// Inputs for [`AppState::assemble`].
pub struct Services<B> {
    pub backend: Arc<B>,
    pub pool: Option<DbPool>,
    pub hub: Arc<AlertHub>,
    pub notifier: NotifierConfig,
    pub scanner: ScannerConfig,
    pub email: Option<Arc<EmailSideChannel>>,
}

impl AppState {
    /// Wire the dispatch pipeline over a single store backend.
    pub fn assemble<B>(config: ServerConfig, services: Services<B>) -> Self
    where
        B: AlertStore + FleetRecords + Directory + 'static,
    {
        let Services {
            backend,
            pool,
            hub,
            notifier,
            scanner,
            email,
        } = services;

        let mut notifier = Notifier::new(backend.clone(), Arc::clone(&hub), notifier);
        if let Some(email) = email {
            notifier = notifier.with_email(email);
        }
        let notifier = Arc::new(notifier);
        let toasts = Arc::new(ToastBus::default());

        Self {
            config: Arc::new(config),
            pool,
            feed: Arc::new(AlertFeed::new(backend.clone(), Arc::clone(&hub))),
            scanner: Arc::new(ExpiryScanner::new(
                backend.clone(),
                Arc::clone(&notifier),
                scanner,
            )),
            domain: Arc::new(DomainNotifications::new(
                Arc::clone(&notifier),
                backend,
                Arc::clone(&toasts),
            )),
            notifier,
            hub,
            toasts,
            ws_manager: Arc::new(WsManager::new()),
        }
    }
}
