//! Catalog domain models
//!
//! Denormalized snapshots of catalog entities as resolved from the
//! remote search API. Artist/album sub-objects are copies, not
//! references: two tracks never share mutable state.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Artist as referenced by a track or album
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogArtist {
    /// Canonical catalog id
    pub id: String,
    pub name: String,
    /// Artwork URL, filled by enrichment when available
    pub image_url: Option<String>,
}

/// Album a track belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    /// Release date as reported by the catalog (YYYY, YYYY-MM or YYYY-MM-DD)
    pub release_date: Option<String>,
    pub artists: Vec<CatalogArtist>,
    pub image_url: Option<String>,
}

/// Canonical catalog record for a resolved track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTrack {
    /// Canonical catalog id, stable across lookups of the same track
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub popularity: i64,
    pub artists: Vec<CatalogArtist>,
    pub album: CatalogAlbum,
    /// Track artwork (usually the album cover), filled by enrichment
    pub image_url: Option<String>,
}

impl CatalogTrack {
    /// Artist ids referenced by the track and its album,
    /// order-preserving and de-duplicated.
    pub fn referenced_artist_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for artist in self.artists.iter().chain(self.album.artists.iter()) {
            if !ids.contains(&artist.id) {
                ids.push(artist.id.clone());
            }
        }
        ids
    }
}

/// Which search query tier produced a catalog match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Structured `track:<title> artist:<artist>` query
    Strict,
    /// Free-text fallback combining both terms
    Loose,
}

impl MatchTier {
    pub fn as_number(&self) -> u8 {
        match self {
            MatchTier::Strict => 1,
            MatchTier::Loose => 2,
        }
    }
}

/// Ephemeral result of one recognizer call; lives for one polling
/// iteration. The raw payload is kept only for artwork and deep-link
/// extraction.
#[derive(Debug, Clone)]
pub struct RecognizedSample {
    pub title: String,
    pub artist: String,
    pub payload: serde_json::Value,
}

/// Catalog track with artwork and deep links resolved, stamped with
/// the station-civil play time. This is what gets persisted.
#[derive(Debug, Clone)]
pub struct EnrichedTrack {
    pub track: CatalogTrack,
    /// platform name -> direct URL; missing links are absent, never empty
    pub external_links: BTreeMap<String, String>,
    /// Station wall-clock time at resolution, fixed civil offset
    pub played_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(id: &str) -> CatalogArtist {
        CatalogArtist {
            id: id.to_string(),
            name: format!("artist {id}"),
            image_url: None,
        }
    }

    #[test]
    fn test_referenced_artist_ids_union_preserves_order() {
        let track = CatalogTrack {
            id: "t1".to_string(),
            name: "Song".to_string(),
            duration_ms: 1000,
            popularity: 10,
            artists: vec![artist("a1"), artist("a2")],
            album: CatalogAlbum {
                id: "al1".to_string(),
                name: "Album".to_string(),
                release_date: None,
                artists: vec![artist("a2"), artist("a3")],
                image_url: None,
            },
            image_url: None,
        };

        assert_eq!(track.referenced_artist_ids(), vec!["a1", "a2", "a3"]);
    }
}
