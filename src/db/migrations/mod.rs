//! Versioned schema changes for the key-value database.
//!
//! Each version `NN` has two files next to this module: `migration_NN_up.sql` moves the schema
//! from `NN-1` to `NN` and `migration_NN_down.sql` moves it back.

use crate::Result;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

/// The SQL that moves the schema to and from one version.
struct Migration {
    version: i32,
    up: &'static str,
    down: &'static str,
}

/// Ordered by version, with no gaps.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up: include_str!("migration_01_up.sql"),
    down: include_str!("migration_01_down.sql"),
}];

/// A single step through the migration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Apply `up` of the version, ending at that version.
    Up(i32),
    /// Apply `down` of the version, ending one below it.
    Down(i32),
}

/// Brings the schema from `from` to `to`, one version per transaction. Every step is checked for
/// a matching migration before the first one runs.
pub(crate) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Result<()> {
    let steps = plan(from, to)?;
    if steps.is_empty() {
        debug!("Schema is at version {to}, nothing to migrate");
        return Ok(());
    }
    for step in steps {
        let (sql, version, resulting) = match step {
            Step::Up(v) => (find(v)?.up, v, v),
            Step::Down(v) => (find(v)?.down, v, v - 1),
        };
        debug!("Applying {step:?} for migration {version:02}");
        apply(pool, sql, resulting)
            .await
            .with_context(|| format!("Migration {version:02} failed"))?;
    }
    debug!("Schema migrated from version {from} to {to}");
    Ok(())
}

fn plan(from: i32, to: i32) -> Result<Vec<Step>> {
    let steps: Vec<Step> = if from <= to {
        ((from + 1)..=to).map(Step::Up).collect()
    } else {
        ((to + 1)..=from).rev().map(Step::Down).collect()
    };
    for step in &steps {
        let (Step::Up(v) | Step::Down(v)) = *step;
        if find(v).is_err() {
            bail!("Migration {v} is required to go from schema version {from} to {to} but does not exist");
        }
    }
    Ok(steps)
}

fn find(version: i32) -> Result<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

async fn apply(pool: &SqlitePool, sql: &str, resulting_version: i32) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    tx.execute(sql).await.context("Failed to execute SQL")?;
    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(resulting_version)
        .execute(&mut *tx)
        .await
        .context("Failed to record the schema version")?;
    tx.commit().await.context("Failed to commit transaction")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn version_zero_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn version(pool: &SqlitePool) -> i32 {
        let row: (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    async fn has_kv_store(pool: &SqlitePool) -> bool {
        let row: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv_store'",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        row.0 > 0
    }

    #[tokio::test]
    async fn test_up_then_down() {
        let pool = version_zero_db().await;
        run(&pool, 0, 1).await.unwrap();
        assert_eq!(version(&pool).await, 1);
        assert!(has_kv_store(&pool).await);

        run(&pool, 1, 0).await.unwrap();
        assert_eq!(version(&pool).await, 0);
        assert!(!has_kv_store(&pool).await);
    }

    #[tokio::test]
    async fn test_same_version_is_a_no_op() {
        let pool = version_zero_db().await;
        run(&pool, 0, 1).await.unwrap();
        run(&pool, 1, 1).await.unwrap();
        assert_eq!(version(&pool).await, 1);
    }

    #[test]
    fn test_plan() {
        assert_eq!(plan(0, 1).unwrap(), vec![Step::Up(1)]);
        assert_eq!(plan(1, 0).unwrap(), vec![Step::Down(1)]);
        assert!(plan(1, 1).unwrap().is_empty());
        assert!(plan(0, 2).is_err());
        assert!(plan(3, 1).is_err());
    }
}
