//! Database connection and schema setup

pub mod functions;
pub mod schema;
pub mod seed;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `url` and sync the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .after_connect(|conn, _meta| Box::pin(functions::register(conn)))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {url}"))?;

        let db = Self { pool };
        db.sync_schema().await?;
        Ok(db)
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Uses a single connection that never expires, since each SQLite
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .after_connect(|conn, _meta| Box::pin(functions::register(conn)))
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.sync_schema().await?;
        Ok(db)
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create any missing tables
    pub async fn sync_schema(&self) -> Result<()> {
        schema::sync_schema(&self.pool)
            .await
            .context("Schema sync failed")?;
        Ok(())
    }

    /// Cheap liveness probe for readiness checks
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}
