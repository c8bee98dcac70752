use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    DbErr, IsolationLevel, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
    /// Log every statement through sqlx
    pub sqlx_logging: bool,
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
            sqlx_logging: false,
        }
    }
}

impl DbConfig {
    /// Single-connection settings for `sqlite::memory:`; every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory_sqlite() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
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
            sqlx_logging: false,
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(config.sqlx_logging);

    gauge!("procure_pay_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::db_error(e)
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Opens a transaction for a multi-entity mutation.
///
/// PostgreSQL and MySQL run it at serializable isolation. SQLite already
/// serializes writers, so it gets a plain `BEGIN`.
pub async fn begin_transaction(db: &DbPool) -> Result<DatabaseTransaction, DbErr> {
    counter!("procure_pay_db.transaction.started", 1);

    match db.get_database_backend() {
        DbBackend::Sqlite => db.begin().await,
        _ => {
            db.begin_with_config(Some(IsolationLevel::Serializable), None)
                .await
        }
    }
}

/// Commits `txn`, recording the outcome in the transaction counters.
pub async fn commit(txn: DatabaseTransaction) -> Result<(), DbErr> {
    let result = txn.commit().await;
    match &result {
        Ok(()) => counter!("procure_pay_db.transaction.committed", 1),
        Err(e) => {
            error!(error = %e, "Transaction commit failed");
            counter!("procure_pay_db.transaction.commit_failed", 1);
        }
    }
    result
}

/// Rolls back `txn` after a failed unit of work. A failing rollback is only
/// logged; the connection discards the transaction either way.
pub async fn rollback(txn: DatabaseTransaction) {
    counter!("procure_pay_db.transaction.rolled_back", 1);
    if let Err(e) = txn.rollback().await {
        error!(error = %e, "Transaction rollback failed");
    }
}

/// Runs database migrations
///
/// # Errors
/// Returns a `ServiceError` if migrations fail to execute
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::db_error);

    let elapsed = start.elapsed();
    histogram!("procure_pay_db.migrations.duration", elapsed);
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    debug!("Checking database connection");
    let start = std::time::Instant::now();

    let result = pool.ping().await.map_err(ServiceError::db_error);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!(
                "procure_pay_db.connection_latency",
                elapsed.as_millis() as f64
            );
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("procure_pay_db.connection_failures", 1);
        }
    }

    result
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");

    pool.close().await.map_err(ServiceError::db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> DbPool {
        establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("sqlite in-memory pool")
    }

    #[tokio::test]
    async fn migrations_apply_on_sqlite() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.expect("migrations");
        assert!(check_connection(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn transaction_helpers_commit_and_roll_back() {
        let pool = memory_pool().await;

        let txn = begin_transaction(&pool).await.expect("begin");
        commit(txn).await.expect("commit");

        let txn = begin_transaction(&pool).await.expect("begin");
        rollback(txn).await;
    }

    #[test]
    fn in_memory_sqlite_keeps_one_connection() {
        let cfg = DbConfig::in_memory_sqlite();
        assert_eq!(cfg.max_connections, 1);
        assert_eq!(cfg.acquire_timeout, DbConfig::default().acquire_timeout);
    }

    #[test]
    fn app_config_maps_pool_settings() {
        let mut cfg = AppConfig::new("postgres://localhost/p2p".into(), "test".into());
        cfg.db_max_connections = 42;
        cfg.db_idle_timeout_secs = 5;

        let db_cfg = DbConfig::from(&cfg);
        assert_eq!(db_cfg.max_connections, 42);
        assert_eq!(db_cfg.idle_timeout, Duration::from_secs(5));
    }
}
