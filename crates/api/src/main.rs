use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetwatch_api::background::BackgroundJobs;
use fleetwatch_api::config::ServerConfig;
use fleetwatch_api::router::build_app_router;
use fleetwatch_api::state::{AppState, Services};
use fleetwatch_api::ws;
use fleetwatch_events::{
    AlertHub, EmailConfig, EmailSideChannel, NotifierConfig, PgBackend, RetentionConfig,
    RetentionSweep, ScannerConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fleetwatch_api=debug,fleetwatch_events=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fleetwatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fleetwatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fleetwatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let backend = Arc::new(PgBackend::new(pool.clone()));

    // --- Email side-channel ---
    let email = match EmailConfig::from_env() {
        Some(email_config) => match email_config.build_provider() {
            Ok(provider) => {
                tracing::info!(provider = provider.name(), "Email delivery enabled");
                Some(Arc::new(EmailSideChannel::new(
                    provider,
                    backend.clone(),
                    backend.clone(),
                    email_config,
                )))
            }
            Err(e) => {
                tracing::error!(error = %e, "Email provider misconfigured, email delivery disabled");
                None
            }
        },
        None => {
            tracing::info!("MAIL_PROVIDER not set, email delivery disabled");
            None
        }
    };

    // --- App state ---
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let state = AppState::assemble(
        config.clone(),
        Services {
            backend: backend.clone(),
            pool: Some(pool),
            hub: Arc::new(AlertHub::from_env()),
            notifier: NotifierConfig::from_env(),
            scanner: ScannerConfig::from_env(),
            email,
        },
    );
    let ws_manager = Arc::clone(&state.ws_manager);

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Background jobs ---
    let retention = Arc::new(RetentionSweep::new(backend, RetentionConfig::from_env()));
    let jobs = BackgroundJobs::start(Arc::clone(&state.scanner), retention);

    // --- Router ---
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    jobs.shutdown(shutdown_timeout).await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining feed sessions");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
