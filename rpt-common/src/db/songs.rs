//! Song database operations
//!
//! `record_track` is the persistence boundary for a resolved track:
//! one transaction upserts artists, then the album, then the song, so
//! a mid-failure never leaves a song referencing missing rows.

use crate::model::{CatalogArtist, CatalogTrack, EnrichedTrack};
use anyhow::Result;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;

/// Insert or update a song row. Mutable fields (name, popularity,
/// external links) are always refreshed; artwork is backfilled only
/// if currently empty.
pub async fn upsert_song<'e, E>(db: E, enriched: &EnrichedTrack) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let external_links = serde_json::to_string(&enriched.external_links)?;

    sqlx::query(
        r#"
        INSERT INTO songs (
            id, name, album_id, duration_ms, popularity, external_links,
            image_url, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            album_id = excluded.album_id,
            duration_ms = excluded.duration_ms,
            popularity = excluded.popularity,
            external_links = excluded.external_links,
            image_url = COALESCE(songs.image_url, excluded.image_url),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&enriched.track.id)
    .bind(&enriched.track.name)
    .bind(&enriched.track.album.id)
    .bind(enriched.track.duration_ms)
    .bind(enriched.track.popularity)
    .bind(external_links)
    .bind(&enriched.track.image_url)
    .execute(db)
    .await?;

    Ok(())
}

/// Link an artist to a song, preserving credit order
pub async fn link_song_artist<'e, E>(
    db: E,
    song_id: &str,
    artist_id: &str,
    artist_order: i64,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO song_artists (song_id, artist_id, artist_order)
        VALUES (?, ?, ?)
        ON CONFLICT(song_id, artist_id) DO NOTHING
        "#,
    )
    .bind(song_id)
    .bind(artist_id)
    .bind(artist_order)
    .execute(db)
    .await?;

    Ok(())
}

/// Merge the track and album artist credits into one map keyed by id,
/// preferring entries that carry an image.
fn merged_artists(track: &CatalogTrack) -> BTreeMap<String, CatalogArtist> {
    let mut merged: BTreeMap<String, CatalogArtist> = BTreeMap::new();

    for artist in track.artists.iter().chain(track.album.artists.iter()) {
        match merged.get_mut(&artist.id) {
            Some(existing) => {
                if existing.image_url.is_none() {
                    existing.image_url = artist.image_url.clone();
                }
            }
            None => {
                merged.insert(artist.id.clone(), artist.clone());
            }
        }
    }

    merged
}

/// Record a resolved track and all its relationships atomically.
///
/// Artists and the album are written before the song row they are
/// referenced by. Rolls back fully on any failure.
pub async fn record_track(pool: &SqlitePool, enriched: &EnrichedTrack) -> Result<()> {
    let mut tx = pool.begin().await?;

    for artist in merged_artists(&enriched.track).values() {
        super::artists::upsert_artist(&mut *tx, artist).await?;
    }

    super::albums::upsert_album(&mut *tx, &enriched.track.album).await?;
    for (order, artist) in enriched.track.album.artists.iter().enumerate() {
        super::albums::link_album_artist(&mut *tx, &enriched.track.album.id, &artist.id, order as i64)
            .await?;
    }

    upsert_song(&mut *tx, enriched).await?;
    for (order, artist) in enriched.track.artists.iter().enumerate() {
        link_song_artist(&mut *tx, &enriched.track.id, &artist.id, order as i64).await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Whether a song with this canonical id is already stored
pub async fn song_exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM songs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::model::CatalogAlbum;
    use chrono::NaiveDate;

    fn enriched(song_id: &str) -> EnrichedTrack {
        let artist = CatalogArtist {
            id: "a1".to_string(),
            name: "Artist One".to_string(),
            image_url: Some("http://img/a1.jpg".to_string()),
        };
        EnrichedTrack {
            track: CatalogTrack {
                id: song_id.to_string(),
                name: "Song".to_string(),
                duration_ms: 183_000,
                popularity: 61,
                artists: vec![artist.clone()],
                album: CatalogAlbum {
                    id: "al1".to_string(),
                    name: "Album".to_string(),
                    release_date: Some("2020-01-10".to_string()),
                    artists: vec![artist],
                    image_url: Some("http://img/al1.jpg".to_string()),
                },
                image_url: Some("http://img/al1.jpg".to_string()),
            },
            external_links: BTreeMap::from([(
                "spotify".to_string(),
                "spotify://track/t1".to_string(),
            )]),
            played_at: NaiveDate::from_ymd_opt(2025, 5, 4)
                .unwrap()
                .and_hms_opt(13, 37, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_record_track_writes_all_rows() {
        let pool = init_memory_pool().await.unwrap();

        record_track(&pool, &enriched("t1")).await.expect("record failed");

        assert!(song_exists(&pool, "t1").await.unwrap());

        let links: String = sqlx::query("SELECT external_links FROM songs WHERE id = 't1'")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("external_links");
        assert!(links.contains("spotify://track/t1"));

        let artist_links: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM song_artists WHERE song_id = 't1'")
                .fetch_one(&pool)
                .await
                .unwrap()
                .get("n");
        assert_eq!(artist_links, 1);

        let album_links: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM album_artists WHERE album_id = 'al1'")
                .fetch_one(&pool)
                .await
                .unwrap()
                .get("n");
        assert_eq!(album_links, 1);
    }

    #[tokio::test]
    async fn test_record_track_is_idempotent() {
        let pool = init_memory_pool().await.unwrap();

        record_track(&pool, &enriched("t1")).await.unwrap();
        record_track(&pool, &enriched("t1")).await.unwrap();

        let songs: i64 = sqlx::query("SELECT COUNT(*) AS n FROM songs")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(songs, 1);
    }

    #[tokio::test]
    async fn test_song_image_backfill_monotonic() {
        let pool = init_memory_pool().await.unwrap();

        record_track(&pool, &enriched("t1")).await.unwrap();

        let mut second = enriched("t1");
        second.track.image_url = None;
        second.track.album.image_url = None;
        second.track.artists[0].image_url = None;
        second.track.album.artists[0].image_url = None;
        record_track(&pool, &second).await.unwrap();

        let image: Option<String> = sqlx::query("SELECT image_url FROM songs WHERE id = 't1'")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("image_url");
        assert_eq!(image.as_deref(), Some("http://img/al1.jpg"));

        let artist = crate::db::artists::load_artist(&pool, "a1").await.unwrap().unwrap();
        assert_eq!(artist.image_url.as_deref(), Some("http://img/a1.jpg"));
    }
}
