//! `leadfunnel` server entry point.
//!
//! Picks the lead store, builds the shared state, and starts the Axum HTTP
//! server with graceful shutdown. A background session sweeper runs
//! alongside the server and is cancelled on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use leadfunnel_store::{LeadStore, MemoryStore};

use leadfunnel_server::build_router;
use leadfunnel_server::config::{ServerConfig, StoreBackendType};
use leadfunnel_server::session::sweep_idle_sessions;
use leadfunnel_server::state::AppState;

/// Longest pause between idle-session sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    for warning in &config.warnings {
        warn!(%warning, "configuration value ignored");
    }

    info!(
        store = ?config.store,
        flow = %config.policy.flow,
        consent = %config.policy.consent,
        "leadfunnel starting"
    );

    let store = build_store(&config)?;
    let state = Arc::new(AppState::new(
        store,
        config.policy.clone(),
        config.download.clone(),
        config.content.clone(),
        config.session_ttl,
    ));

    // Shutdown signal channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_handle = tokio::spawn(sweep_idle_sessions(
        Arc::clone(&state.sessions),
        shutdown_rx,
        (config.session_ttl / 2).clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL),
    ));

    let app = build_router(state);

    // Bind and serve.
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "leadfunnel listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), sweeper_handle).await;

    info!("leadfunnel stopped");
    Ok(())
}

/// Construct the configured lead store and report whether it can reach a
/// backend. Missing credentials are logged, not fatal: the page still
/// renders and each submission fails with the generic notice.
fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn LeadStore>> {
    match &config.store {
        StoreBackendType::Memory => {
            info!("using in-memory lead store (leads will not persist)");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "postgrest")]
        StoreBackendType::Postgrest {
            url,
            api_key,
            table,
        } => {
            let store = leadfunnel_store::PostgrestStore::new(leadfunnel_store::PostgrestConfig {
                url: url.clone(),
                api_key: api_key.clone(),
                table: table.clone(),
                ..leadfunnel_store::PostgrestConfig::default()
            })
            .context("failed to build PostgREST client")?;

            if store.is_configured() {
                info!(url = ?url, table = %table, "using PostgREST lead store");
            } else {
                error!(
                    missing = %store.missing().join(", "),
                    "lead backend is not configured, submissions will fail until \
                     LEADFUNNEL_SUPABASE_URL and LEADFUNNEL_SUPABASE_ANON_KEY are set"
                );
            }
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgrest"))]
        StoreBackendType::Postgrest { .. } => {
            anyhow::bail!("PostgREST store requested but feature 'postgrest' is not enabled");
        }
    }
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
