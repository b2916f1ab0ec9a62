/// Database module for SQLite persistence
///
/// Stores the activity log so past sync attempts and connection tests can be
/// listed later, and the rate windows so cooldowns hold across CLI runs.
/// Uses sqlx with WAL mode for concurrent readers.
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub mod activity;
pub mod rate_windows;

pub use activity::SqliteActivityLog;
pub use rate_windows::{RateWindowStore, SqliteRateGate};

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist, enables WAL mode and
    /// runs migrations.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    ///
    /// Migrations are idempotent and can be run multiple times safely.
    async fn run_migrations(&self) -> Result<()> {
        debug!("Running database migrations");

        sqlx::raw_sql(include_str!("../../migrations/001_activity_log.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_activity_log.sql")?;

        sqlx::raw_sql(include_str!("../../migrations/002_rate_windows.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 002_rate_windows.sql")?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection
    ///
    /// Checkpoints the WAL and closes all connections in the pool.
    pub async fn close(self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        self.pool.close().await;
        debug!("Database connection closed");
        Ok(())
    }

    /// Create an activity log backed by this database
    pub fn activity_log(&self) -> SqliteActivityLog {
        SqliteActivityLog::new(self.pool.clone())
    }

    /// Create a store for rate window state backed by this database
    pub fn rate_windows(&self) -> RateWindowStore {
        RateWindowStore::new(self.pool.clone())
    }
}
