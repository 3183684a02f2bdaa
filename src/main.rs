use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use muse_backend::chat::create_message_store;
use muse_backend::config::Settings;
use muse_backend::server::{create_app, AppState};
use muse_backend::shutdown::GracefulShutdown;
use muse_backend::users::create_user_directory;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Connect to Postgres when configured, otherwise run on in-memory backends
    let pool = match settings.database.url {
        Some(ref url) => {
            let pool = PgPoolOptions::new()
                .max_connections(settings.database.pool_size)
                .acquire_timeout(Duration::from_secs(u64::from(
                    settings.database.connect_timeout_seconds,
                )))
                .connect(url)
                .await?;
            tracing::info!("Connected to Postgres");
            Some(pool)
        }
        None => {
            tracing::warn!("No database URL configured, using in-memory storage");
            None
        }
    };

    let message_store = create_message_store(pool.clone());
    let user_directory = create_user_directory(pool.clone());

    // Create application state
    let state = AppState::new(settings.clone(), message_store, user_directory, pool);
    let registry = state.registry.clone();
    tracing::info!("Application state initialized");

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close remaining chat connections before exiting
    let shutdown = GracefulShutdown::new(registry);
    shutdown.execute("server stopping").await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
