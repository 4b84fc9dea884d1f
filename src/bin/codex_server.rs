//! # Codex Generation Server
//!
//! Standalone deployment of the generation engine behind its HTTP surface.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/codex cargo run --bin codex-server
//!
//! # Environment overlay and JSON logs
//! CODEX_ENV=production CODEX_LOG_FORMAT=json cargo run --bin codex-server
//! ```

use anyhow::Context;
use codex_core::config::ConfigManager;
use codex_core::database::{connect, CodexStore, PgCodexStore};
use codex_core::logging;
use codex_core::orchestration::WebhookNotifier;
use codex_core::providers::{HttpProviderGateway, ProviderResolver};
use codex_core::web::{create_app, state::AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!("Starting Codex Generation Server");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let manager = ConfigManager::load().context("failed to load configuration")?;
    let config = manager.config();
    info!("   Environment: {}", manager.environment());
    info!("   Config directory: {}", manager.config_directory().display());

    let pool = connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    let store: Arc<dyn CodexStore> = Arc::new(PgCodexStore::new(pool));

    let gateway = HttpProviderGateway::new(&config.providers)
        .context("failed to build provider gateway")?;
    let resolver = ProviderResolver::new(store.clone(), config.providers.default_provider.clone());
    let notifier = WebhookNotifier::from_config(&config.notification)
        .context("failed to build completion notifier")?;

    let state = AppState::build(
        store,
        Arc::new(gateway),
        resolver,
        Arc::from(notifier),
        config,
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.web.bind_address))?;
    info!("   Listening on {}", config.web.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Codex Generation Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
