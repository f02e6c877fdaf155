//! Album database operations

use crate::model::CatalogAlbum;
use anyhow::Result;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

/// Insert or update an album. Artwork follows the
/// backfill-only-if-empty policy.
pub async fn upsert_album<'e, E>(db: E, album: &CatalogAlbum) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO albums (id, name, release_date, image_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            release_date = excluded.release_date,
            image_url = COALESCE(albums.image_url, excluded.image_url),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&album.id)
    .bind(&album.name)
    .bind(&album.release_date)
    .bind(&album.image_url)
    .execute(db)
    .await?;

    Ok(())
}

/// Link an artist to an album, preserving credit order
pub async fn link_album_artist<'e, E>(
    db: E,
    album_id: &str,
    artist_id: &str,
    artist_order: i64,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO album_artists (album_id, artist_id, artist_order)
        VALUES (?, ?, ?)
        ON CONFLICT(album_id, artist_id) DO NOTHING
        "#,
    )
    .bind(album_id)
    .bind(artist_id)
    .bind(artist_order)
    .execute(db)
    .await?;

    Ok(())
}

/// Load album by canonical id (artist links not populated)
pub async fn load_album(pool: &SqlitePool, id: &str) -> Result<Option<CatalogAlbum>> {
    let row = sqlx::query("SELECT id, name, release_date, image_url FROM albums WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| CatalogAlbum {
        id: row.get("id"),
        name: row.get("name"),
        release_date: row.get("release_date"),
        artists: Vec::new(),
        image_url: row.get("image_url"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_upsert_album_backfill_image() {
        let pool = init_memory_pool().await.unwrap();

        let mut album = CatalogAlbum {
            id: "al1".to_string(),
            name: "Album".to_string(),
            release_date: Some("2021-06-01".to_string()),
            artists: Vec::new(),
            image_url: None,
        };

        upsert_album(&pool, &album).await.unwrap();

        album.image_url = Some("http://img/cover.jpg".to_string());
        upsert_album(&pool, &album).await.unwrap();

        // Backfilled once, then immune to NULL
        album.image_url = None;
        upsert_album(&pool, &album).await.unwrap();

        let loaded = load_album(&pool, "al1").await.unwrap().unwrap();
        assert_eq!(loaded.image_url.as_deref(), Some("http://img/cover.jpg"));
        assert_eq!(loaded.release_date.as_deref(), Some("2021-06-01"));
    }
}
