//! Connection pool and schema bootstrap for the product/order store.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub type DbPool = DatabaseConnection;

/// Pool tuning, usually derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

impl DbConfig {
    /// Every connection to `sqlite::memory:` opens a separate empty database
    fn is_sqlite_memory(&self) -> bool {
        let url = self.url.trim();
        url.starts_with("sqlite::memory:") || url.contains("mode=memory")
    }
}

/// Opens the pool.
///
/// # Errors
/// `ServiceError::Configuration` when the URL is blank, `ServiceError::DatabaseError`
/// when the store cannot be reached.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    if config.url.trim().is_empty() {
        return Err(ServiceError::Configuration(
            "database_url is not set".to_string(),
        ));
    }

    let mut max_connections = config.max_connections;
    let mut min_connections = config.min_connections;
    if config.is_sqlite_memory() && max_connections > 1 {
        warn!(
            requested = max_connections,
            "in-memory sqlite is limited to a single connection"
        );
        max_connections = 1;
        min_connections = 1;
    }

    debug!(max_connections, min_connections, "opening database pool");

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("materialesya_db.max_connections", max_connections as f64);

    let pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "could not open database pool");
        counter!("materialesya_db.connection_failures", 1);
        ServiceError::DatabaseError(e)
    })?;

    info!(backend = ?pool.get_database_backend(), "database pool ready");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    cfg.ensure_backend_configured()?;
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies every pending embedded migration
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    let result = crate::migrator::Migrator::up(pool, None).await;

    match result {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "schema is up to date");
            Ok(())
        }
        Err(e) => {
            error!(elapsed = ?started.elapsed(), error = %e, "migrations failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

/// Round-trips a ping; used by the health endpoint
pub async fn check_connection(pool: &DbPool) -> Result<Duration, ServiceError> {
    let started = Instant::now();
    match pool.ping().await {
        Ok(()) => {
            let elapsed = started.elapsed();
            gauge!(
                "materialesya_db.connection_latency",
                elapsed.as_millis() as f64
            );
            Ok(elapsed)
        }
        Err(e) => {
            warn!(error = %e, "database ping failed");
            counter!("materialesya_db.connection_failures", 1);
            Err(ServiceError::DatabaseError(e))
        }
    }
}
