//! Artist database operations
//!
//! Upserts are idempotent on the canonical catalog id. Artwork is
//! backfill-only-if-empty: a known image is never overwritten by an
//! incoming NULL.

use crate::model::CatalogArtist;
use anyhow::Result;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

/// Insert or update an artist
pub async fn upsert_artist<'e, E>(db: E, artist: &CatalogArtist) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO artists (id, name, image_url, created_at, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            image_url = COALESCE(artists.image_url, excluded.image_url),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&artist.id)
    .bind(&artist.name)
    .bind(&artist.image_url)
    .execute(db)
    .await?;

    Ok(())
}

/// Load stored image URLs for the given artist ids.
///
/// The returned map holds an entry per artist row that exists; an
/// entry with `None` means the artist is known but has no image yet.
/// Ids with no row at all are absent from the map.
pub async fn get_artist_images(
    pool: &SqlitePool,
    artist_ids: &[String],
) -> Result<HashMap<String, Option<String>>> {
    let mut images = HashMap::new();

    for id in artist_ids {
        let row = sqlx::query("SELECT image_url FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        if let Some(row) = row {
            images.insert(id.clone(), row.get("image_url"));
        }
    }

    Ok(images)
}

/// Load artist by canonical id
pub async fn load_artist(pool: &SqlitePool, id: &str) -> Result<Option<CatalogArtist>> {
    let row = sqlx::query("SELECT id, name, image_url FROM artists WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| CatalogArtist {
        id: row.get("id"),
        name: row.get("name"),
        image_url: row.get("image_url"),
    }))
}
