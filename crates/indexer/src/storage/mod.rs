//! Storage layer for the CreditNet indexer.
//!
//! This module provides database operations for:
//! - Trust-graph edges (idempotent upsert, delete-on-zero, path enumeration)
//! - Per-account transaction history (append-only dual write)
//! - The account directory (address -> username)

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub mod edge;
pub mod history;
pub mod types;

pub use types::*;

/// Database storage for the indexer.
///
/// Cheap to clone; all clones share one SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// Creates the database file if it doesn't exist. Pool sizes fall back to
    /// defaults when `None`.
    pub async fn new(
        database_url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .min_connections(min_connections.unwrap_or(1))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance from a filesystem path.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let database_url = format!("sqlite://{}", path.as_ref().display());
        Self::new(&database_url, None, None).await
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Get database statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let edge_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trust_edges")
            .fetch_one(&self.pool)
            .await?;

        let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_transactions")
            .fetch_one(&self.pool)
            .await?;

        let account_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            edge_count: edge_count as u64,
            history_count: history_count as u64,
            account_count: account_count as u64,
        })
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of live trust edges.
    pub edge_count: u64,
    /// Total number of history records.
    pub history_count: u64,
    /// Total number of directory accounts.
    pub account_count: u64,
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_storage;

    #[tokio::test]
    async fn storage_creation_and_health() {
        let (storage, _temp_db) = setup_storage().await;
        storage.health_check().await.unwrap();
        storage.close().await;
    }

    #[tokio::test]
    async fn fresh_database_stats_are_zero() {
        let (storage, _temp_db) = setup_storage().await;

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.edge_count, 0);
        assert_eq!(stats.history_count, 0);
        assert_eq!(stats.account_count, 0);

        storage.close().await;
    }
}
