use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stockpile_backup::bucket::FileBucket;
use stockpile_backup::{BackupContext, BackupService, PoolConfig, WorkerPool};
use stockpile_db::store::memory::MemoryJobStore;
use stockpile_db::store::postgres::PgStore;
use stockpile_db::store::{JobStore, RegistrySet};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpile_api::config::ServerConfig;
use stockpile_api::router::build_app_router;
use stockpile_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stockpile_api=debug,stockpile_backup=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pool_config = PoolConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Stores ---
    let (db, store, registries) = match &config.database_url {
        Some(database_url) => {
            let pool = stockpile_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            stockpile_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            stockpile_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            (
                Some(pool.clone()),
                Arc::new(PgStore::new(pool.clone())) as Arc<dyn JobStore>,
                RegistrySet::postgres(pool),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            (
                None,
                Arc::new(MemoryJobStore::new()) as Arc<dyn JobStore>,
                RegistrySet::in_memory(),
            )
        }
    };

    // --- Blob storage ---
    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .expect("Failed to create STORAGE_ROOT");
    let bucket = Arc::new(FileBucket::new(config.storage_root.clone()));
    tracing::info!(root = %config.storage_root.display(), "File bucket ready");

    // --- Worker pool ---
    let cancel = CancellationToken::new();
    let ctx = BackupContext::new(store, registries, bucket);
    let pool = WorkerPool::start(ctx.clone(), pool_config, cancel.clone());
    match pool.recover().await {
        Ok(requeued) => tracing::info!(requeued, "Backup job recovery finished"),
        Err(e) => tracing::error!(error = %e, "Backup job recovery failed"),
    }

    // --- App state ---
    let state = AppState {
        backup: BackupService::new(ctx, pool.clone()),
        config: Arc::new(config.clone()),
        db,
    };
    let app = build_app_router(state, &config);

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
    tracing::info!("Server stopped accepting connections, stopping backup jobs");
    let drained = pool
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if !drained {
        tracing::warn!("Some backup jobs were still running at exit");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
