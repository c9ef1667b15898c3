use sqlx::{postgres::PgPoolOptions, PgPool};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use std::sync::Arc;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::database::{AppointmentStore, MemoryStore, PgStore};

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Builds the Postgres pool shared by every request
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let redacted = Self::redacted_url(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected database pool: {}", redacted);

        if config.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations applied");
        }

        Ok(pool)
    }

    /// Store selected by `database.backend`
    pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn AppointmentStore>, DatabaseError> {
        match config.backend {
            StoreBackend::Postgres => {
                let pool = Self::connect(config).await?;
                Ok(Arc::new(PgStore::new(pool, QueryTimer::from_config(config))))
            }
            StoreBackend::Memory => {
                warn!("Using in-memory appointment store; data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    /// Connection string with the password removed, safe for logs
    fn redacted_url(raw: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("***"))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.to_string())
    }
}

/// Slow query detection around a single store call
#[derive(Debug, Clone, Copy)]
pub struct QueryTimer {
    enabled: bool,
    threshold: Duration,
}

impl QueryTimer {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            enabled: config.enable_slow_query_warning,
            threshold: Duration::from_millis(config.slow_query_threshold_ms),
        }
    }

    pub async fn track<T, F>(&self, table: &'static str, operation: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let out = fut.await;
        let elapsed = started.elapsed();

        if self.enabled && elapsed >= self.threshold {
            warn!(
                table,
                operation,
                duration_ms = elapsed.as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                "Slow query detected"
            );
        }
        out
    }
}
