//! Storage layer
//!
//! Connection pooling plus the draft/live store adapters.

pub mod memory;
pub mod postgres;
pub mod queries;
pub mod repository;
pub mod schema;

pub use memory::MemoryCourseRepository;
pub use postgres::PgCourseRepository;
pub use repository::{CourseRepository, PublishUnitOfWork, StoreError};

use crate::config::DatabaseConfig;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Build a connection pool and verify it can reach the server.
///
/// Waiting for a free connection gives up after `acquire_timeout`.
pub async fn create_pool(config: &DatabaseConfig, acquire_timeout: Duration) -> anyhow::Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    let mut pool_config = PoolConfig::new(config.max_pool_size);
    pool_config.timeouts.wait = Some(acquire_timeout);
    cfg.pool = Some(pool_config);

    // Managed hosts (Neon etc.) require TLS
    let pool = if config.use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;
    client
        .query_one("SELECT 1 as ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!("✅ Database connection successful (TLS: {})", config.use_tls);
    Ok(pool)
}
