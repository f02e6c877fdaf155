//! SQLite access layer for the radio play tracker
//!
//! Narrow read/write contract over the durable store: idempotent
//! upserts for catalog entities, insert-or-ignore play events, and
//! per-station polling state.

pub mod albums;
pub mod artists;
pub mod plays;
pub mod schema;
pub mod songs;
pub mod station_state;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (or creates) the tracker database and brings the schema up.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    schema::initialize_schema(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests
///
/// Capped at one connection so every query sees the same in-memory
/// database.
#[cfg(any(test, feature = "test-util"))]
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    schema::initialize_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("rpt.db");

        let pool = init_database_pool(&db_path).await.expect("init failed");
        drop(pool);

        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_data_survives_pool_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rpt.db");

        let pool = init_database_pool(&db_path).await.unwrap();
        station_state::set_last_track(&pool, "glglz", "t1")
            .await
            .unwrap();
        pool.close().await;

        let reopened = init_database_pool(&db_path).await.unwrap();
        assert_eq!(
            station_state::get_last_track(&reopened, "glglz")
                .await
                .unwrap()
                .as_deref(),
            Some("t1")
        );
    }
}
