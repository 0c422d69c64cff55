//! This module is responsible for reading, writing and managing the SQLite database that holds
//! the key-value store.

mod migrations;

use crate::store::KeyValue;
use crate::Result;
use anyhow::{bail, Context};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// The schema version this build of the program expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that there is a SQLite file at `path`
    /// - Creates a SQLite connection pool
    /// - Updates the database schema with migrations if it is out-of-date
    /// - Returns a constructed `Db` object for further operations
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The SQLite database is missing '{}'", path.display())
        }
        let pool = connect(path, false).await?;
        let version = schema_version(&pool).await?;
        migrations::run(&pool, version, CURRENT_VERSION).await?;
        Ok(Self { pool })
    }

    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    /// - Returns a constructed `Db` object for further operations
    pub(crate) async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A SQLite database already exists at '{}'", path.display())
        }
        let pool = connect(path, true).await?;

        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Failed to insert initial schema version")?;

        migrations::run(&pool, 0, CURRENT_VERSION).await?;
        debug!("Created SQLite database at {}", path.display());
        Ok(Self { pool })
    }

    /// Returns the number of keys in the store.
    pub(crate) async fn count_keys(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kv_store")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count keys")?;
        Ok(row.0 as u64)
    }
}

#[async_trait::async_trait]
impl KeyValue for Db {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read key '{key}'"))?;
        Ok(row.map(|r| r.0))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write key '{key}'"))?;
        Ok(())
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .context("Failed to parse SQLite connection string")?
        .create_if_missing(create);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open SQLite database at {}", path.display()))
}

async fn schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to query schema version")?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("budget.sqlite");
        let db = Db::init(&path).await.unwrap();
        assert_eq!(db.count_keys().await.unwrap(), 0);
        db.set("fm_current_year", "2026").await.unwrap();
        drop(db);

        let db = Db::load(&path).await.unwrap();
        assert_eq!(
            db.get("fm_current_year").await.unwrap().as_deref(),
            Some("2026")
        );
        assert_eq!(db.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_init_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("budget.sqlite");
        let _db = Db::init(&path).await.unwrap();
        assert!(Db::init(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(Db::load(dir.path().join("nope.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("budget.sqlite")).await.unwrap();
        db.set("k", "one").await.unwrap();
        db.set("k", "two").await.unwrap();
        assert_eq!(db.get("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(db.count_keys().await.unwrap(), 1);
    }
}
