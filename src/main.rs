//! Course Publisher - draft-to-live course publishing service
//!
//! Authors edit courses in the draft area. Publishing copies a draft course
//! and every child entity into the live catalog inside one transaction,
//! remapping ids so the live graph only references live rows. Republishing
//! refreshes the same live course; unpublishing hides it without deleting.

mod audit;
mod config;
mod db;
mod error;
mod models;
mod publish;
mod routes;
mod state;

use crate::config::{Settings, StorageBackend};
use crate::db::{CourseRepository, MemoryCourseRepository, PgCourseRepository};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Course Publisher...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let repo = init_repository(&settings).await?;
    let state = Arc::new(AppState::new(repo, settings.publish.timeout));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  /health                        - Liveness check");
    info!("   POST /draft-courses/{{id}}/publish    - Publish a draft course");
    info!("   POST /draft-courses/{{id}}/unpublish  - Unpublish a draft's live course");
    info!("   GET  /live-courses/{{id}}             - Read a published course");
    info!("   GET  /audit                         - Publish/unpublish audit log");
    info!("");
    info!(
        "⏱️  Publish timeout: {}s, storage: {:?}",
        settings.publish.timeout.as_secs(),
        settings.storage
    );

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,course_publisher=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Pick the storage backend and prepare it
async fn init_repository(settings: &Settings) -> anyhow::Result<Arc<dyn CourseRepository>> {
    match settings.storage {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&settings.database, settings.publish.timeout).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to initialize database pool ({}:{}/{}): {}",
                    settings.database.host,
                    settings.database.port,
                    settings.database.database,
                    e
                )
            })?;
            info!("✅ Database pool created successfully");

            db::schema::create_course_tables(&pool).await?;

            Ok(Arc::new(PgCourseRepository::new(pool, settings.publish.timeout)))
        }
        StorageBackend::Memory => {
            warn!("⚠️  STORAGE_BACKEND=memory: empty store with no draft editor, smoke tests only");
            Ok(Arc::new(MemoryCourseRepository::new()))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
