//! Mira Engine
//!
//! Usage accounting and recommendation backend for the Mira AI chat platform.
//!
//! # Architecture
//!
//! - **Usage/Cost Engine**: deterministic token-cost accounting and
//!   tier-aware model routing
//! - **Recommendation Engine**: personalized character ranking
//! - **API Server**: REST endpoints for frontend and serving-layer consumption
//!
//! # Graceful Shutdown
//!
//! The engine handles SIGTERM and SIGINT signals, ensuring:
//! - In-flight requests complete
//! - Database connections are closed cleanly

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod database;
mod error;
mod persona;
mod recommendation;
mod usage;

use config::Config;
use database::Database;
use error::Result;

/// Application state shared across components
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub shutdown: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with structured logging
    init_tracing();

    info!("Mira Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("  Components:");
    info!("    - Usage/Cost Engine");
    info!("    - Recommendation Engine");
    info!("    - REST API Server");

    // Load configuration
    let config = Config::from_env()?;
    let config = Arc::new(config);
    info!("Configuration loaded and validated");

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Initialize database connection pool
    let db = Database::new(&config.database).await?;
    info!("Database connection pool established");

    // Run migrations
    info!("Running database migrations...");
    database::run_migrations(db.pool()).await?;
    info!("Database migrations applied");

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: db.clone(),
        shutdown: shutdown_tx.clone(),
    });

    // Spawn all services
    let mut handles = Vec::new();

    // Spawn recommendation maintenance job
    info!("Starting recommendation updater...");
    handles.push(spawn_recommendation_updater(state.clone()));

    // Spawn API server
    info!("Starting API server on port {}...", config.api.port);
    handles.push(spawn_api_server(state.clone()));

    info!("All services started successfully");
    info!(
        "API: http://{}:{} (health: /health)",
        config.api.host, config.api.port
    );

    // Wait for shutdown signal or service failure
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        _ = wait_for_any_failure(&mut handles) => {
            warn!("A service failed, initiating shutdown");
        }
    }

    // Graceful shutdown
    info!("Initiating graceful shutdown...");

    // Signal all services to stop
    let _ = shutdown_tx.send(());

    // Wait for services to finish with timeout
    let shutdown_timeout = Duration::from_secs(30);
    if tokio::time::timeout(shutdown_timeout, shutdown_services(handles))
        .await
        .is_err()
    {
        warn!("Shutdown timeout exceeded, forcing exit");
    }

    // Cleanup resources
    db.close().await;

    info!("Mira Engine stopped gracefully");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default log levels
        EnvFilter::new("mira_engine=debug,tower_http=debug,sqlx=warn,info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .init();
}

/// Spawn the periodic recommendation maintenance job
fn spawn_recommendation_updater(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = state.shutdown.subscribe();

    tokio::spawn(async move {
        let update_interval = state.config.recommendation.popularity_update_interval;
        let mut interval = tokio::time::interval(update_interval);

        // Skip first tick (runs immediately otherwise)
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    info!("Running scheduled recommendation maintenance...");

                    let pool = state.db.pool();

                    if let Err(e) = recommendation::updater::refresh_popularity_counts(pool).await {
                        error!("Failed to refresh popularity counters: {:?}", e);
                    }

                    if let Err(e) = recommendation::updater::prune_expired_caches(pool).await {
                        error!("Failed to prune expired caches: {:?}", e);
                    }

                    if let Err(e) = recommendation::updater::warm_recommendation_caches(
                        pool,
                        &state.config.recommendation,
                    )
                    .await
                    {
                        error!("Failed to warm recommendation caches: {:?}", e);
                    }

                    info!("Recommendation maintenance completed");
                }
                _ = shutdown_rx.recv() => {
                    info!("Recommendation updater shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn the API server
fn spawn_api_server(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let pool = state.db.pool().clone();
    let config = state.config.clone();
    let mut shutdown_rx = state.shutdown.subscribe();

    tokio::spawn(async move {
        tokio::select! {
            result = api::start_server(pool, config) => {
                if let Err(e) = result {
                    error!("API server error: {:?}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("API server shutting down");
            }
        }
    })
}

/// Wait for any task to fail
async fn wait_for_any_failure(handles: &mut [tokio::task::JoinHandle<()>]) {
    loop {
        for handle in handles.iter_mut() {
            if handle.is_finished() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for all services to complete shutdown
async fn shutdown_services(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
