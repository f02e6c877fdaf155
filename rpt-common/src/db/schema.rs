//! Database schema for the radio play tracker
//!
//! Catalog entities (artists, albums, songs) keyed by their canonical
//! catalog ids; append-only play events; per-station polling state.

use anyhow::Result;
use sqlx::SqlitePool;

/// Create all tracker tables and indexes if they don't exist
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            display_name TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            image_url TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            release_date TEXT,
            image_url TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS album_artists (
            album_id TEXT NOT NULL REFERENCES albums(id),
            artist_id TEXT NOT NULL REFERENCES artists(id),
            artist_order INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (album_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            album_id TEXT REFERENCES albums(id),
            duration_ms INTEGER NOT NULL DEFAULT 0,
            popularity INTEGER NOT NULL DEFAULT 0,
            external_links TEXT NOT NULL DEFAULT '{}',
            image_url TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS song_artists (
            song_id TEXT NOT NULL REFERENCES songs(id),
            artist_id TEXT NOT NULL REFERENCES artists(id),
            artist_order INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (song_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plays (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            song_id TEXT NOT NULL REFERENCES songs(id),
            station_id INTEGER NOT NULL REFERENCES stations(id),
            played_at TEXT NOT NULL,
            UNIQUE (song_id, station_id, played_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS station_state (
            station_name TEXT PRIMARY KEY,
            last_track_id TEXT,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_plays_station_time ON plays (station_id, played_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plays_song ON plays (song_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database schema initialized");

    Ok(())
}
