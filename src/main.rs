use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gather_invite_service::config::Settings;
use gather_invite_service::delivery::{InviteTransport, SmtpTransport};
use gather_invite_service::postgres::PostgresPool;
use gather_invite_service::server::{create_app, AppState};
use gather_invite_service::storage::{DispatchStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Durable store: PostgreSQL when a URL is configured, in-memory otherwise
    let (store, postgres): (Arc<dyn DispatchStore>, Option<PostgresPool>) =
        if settings.database.url.is_some() {
            let pool = PostgresPool::new(&settings.database).await?;
            tracing::info!(url = %pool.database_url_masked(), "Using PostgreSQL store");
            (Arc::new(PostgresStore::new(pool.pool().clone())), Some(pool))
        } else {
            tracing::warn!("No database URL configured, using in-memory store");
            (Arc::new(MemoryStore::new()), None)
        };

    // Email transport: only constructed when SMTP settings are present
    let transport: Option<Arc<dyn InviteTransport>> = match &settings.smtp {
        Some(smtp) => {
            let transport = SmtpTransport::new(smtp)
                .map_err(|e| anyhow::anyhow!("failed to build SMTP transport: {e}"))?;
            tracing::info!(host = %smtp.host, "SMTP transport configured");
            Some(Arc::new(transport))
        }
        None => {
            tracing::warn!("No SMTP settings, email dispatch requests will be rejected");
            None
        }
    };

    // Create application state
    let state = AppState::new(settings.clone(), store, transport, postgres.clone());
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

    if let Some(pool) = postgres {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

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
