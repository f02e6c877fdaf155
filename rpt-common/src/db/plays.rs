//! Play event database operations
//!
//! Plays are append-only. Exact duplicates keyed on
//! (song_id, station_id, played_at) are silently ignored so a retried
//! write that already succeeded never errors or double-records.

use anyhow::Result;
use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};

/// Timestamp storage format (station civil time, no zone marker)
const PLAYED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Look up a station's internal id, creating the row on first sight
pub async fn get_or_create_station(pool: &SqlitePool, station_name: &str) -> Result<i64> {
    let row = sqlx::query("SELECT id FROM stations WHERE name = ?")
        .bind(station_name)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        return Ok(row.get("id"));
    }

    let result = sqlx::query("INSERT INTO stations (name, display_name) VALUES (?, ?)")
        .bind(station_name)
        .bind(station_name.to_uppercase())
        .execute(pool)
        .await?;

    tracing::info!(station = %station_name, "Created station row");

    Ok(result.last_insert_rowid())
}

/// Append a play event. Returns true if a new row was written, false
/// if an identical play was already recorded.
pub async fn record_play(
    pool: &SqlitePool,
    song_id: &str,
    station_id: i64,
    played_at: NaiveDateTime,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO plays (song_id, station_id, played_at)
        VALUES (?, ?, ?)
        ON CONFLICT(song_id, station_id, played_at) DO NOTHING
        "#,
    )
    .bind(song_id)
    .bind(station_id)
    .bind(played_at.format(PLAYED_AT_FORMAT).to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of plays recorded for a song on a station
pub async fn count_plays(pool: &SqlitePool, song_id: &str, station_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM plays WHERE song_id = ? AND station_id = ?")
        .bind(song_id)
        .bind(station_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}
