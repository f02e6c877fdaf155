//! Per-station polling state
//!
//! Holds each station's last recorded track id, the sole
//! de-duplication signal for "same song still playing". Loaded at
//! startup and written after every successful record so a restart
//! never re-announces the currently-playing track.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// Load the last recorded track id for every station
pub async fn load_all(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    let rows = sqlx::query(
        "SELECT station_name, last_track_id FROM station_state WHERE last_track_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("station_name"), row.get("last_track_id")))
        .collect())
}

/// Load one station's last recorded track id
pub async fn get_last_track(pool: &SqlitePool, station_name: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT last_track_id FROM station_state WHERE station_name = ?")
        .bind(station_name)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|row| row.get("last_track_id")))
}

/// Persist a station's last recorded track id
pub async fn set_last_track(pool: &SqlitePool, station_name: &str, track_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO station_state (station_name, last_track_id, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(station_name) DO UPDATE SET
            last_track_id = excluded.last_track_id,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(station_name)
    .bind(track_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_state_roundtrip_and_update() {
        let pool = init_memory_pool().await.unwrap();

        assert_eq!(get_last_track(&pool, "glglz").await.unwrap(), None);

        set_last_track(&pool, "glglz", "t1").await.unwrap();
        assert_eq!(
            get_last_track(&pool, "glglz").await.unwrap().as_deref(),
            Some("t1")
        );

        set_last_track(&pool, "glglz", "t2").await.unwrap();
        assert_eq!(
            get_last_track(&pool, "glglz").await.unwrap().as_deref(),
            Some("t2")
        );
    }

    #[tokio::test]
    async fn test_load_all_survives_restart() {
        let pool = init_memory_pool().await.unwrap();

        set_last_track(&pool, "glglz", "t1").await.unwrap();
        set_last_track(&pool, "eco99", "t9").await.unwrap();

        // A fresh registry loading from the same store sees both
        let all = load_all(&pool).await.unwrap();
        assert_eq!(all.get("glglz").map(String::as_str), Some("t1"));
        assert_eq!(all.get("eco99").map(String::as_str), Some("t9"));
    }
}
