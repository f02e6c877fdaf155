//! Spotify catalog client
//!
//! Resolves recognized (title, artist) pairs to canonical catalog
//! records and batches artist artwork lookups. Holds a
//! client-credentials bearer token in memory, validated with a
//! lightweight probe search and re-exchanged on expiry.

use crate::error::PollError;
use crate::services::Catalog;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rpt_common::model::{CatalogAlbum, CatalogArtist, CatalogTrack, MatchTier};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const AUTH_URL: &str = "https://accounts.spotify.com/api/token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote APIs cap batched artist lookups
const ARTIST_BATCH_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: String,
    name: String,
    #[serde(default)]
    duration_ms: i64,
    #[serde(default)]
    popularity: i64,
    artists: Vec<ArtistItem>,
    album: AlbumItem,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    id: String,
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistItem>,
    #[serde(default)]
    images: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    url: String,
    width: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    /// Unknown ids come back as null entries
    artists: Vec<Option<FullArtistItem>>,
}

#[derive(Debug, Deserialize)]
struct FullArtistItem {
    id: String,
    #[serde(default)]
    images: Vec<ImageItem>,
}

/// Spotify API client with cached client-credentials token
pub struct SpotifyClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    api_base_url: String,
    auth_url: String,
    token: Mutex<Option<String>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, PollError> {
        Self::with_base_urls(
            client_id,
            client_secret,
            API_BASE_URL.to_string(),
            AUTH_URL.to_string(),
        )
    }

    /// Construct against alternative endpoints (tests)
    pub fn with_base_urls(
        client_id: String,
        client_secret: String,
        api_base_url: String,
        auth_url: String,
    ) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PollError::RemoteUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            client_id,
            client_secret,
            api_base_url,
            auth_url,
            token: Mutex::new(None),
        })
    }

    /// Client-credentials exchange. Failure here is an auth failure,
    /// fatal for the station's current cycle but not for the process.
    async fn exchange_token(&self) -> Result<String, PollError> {
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http_client
            .post(&self.auth_url)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PollError::AuthFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PollError::AuthFailure(format!("{status}: {error_text}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PollError::AuthFailure(format!("token parse failed: {e}")))?;

        tracing::info!("Obtained new catalog access token");

        Ok(token.access_token)
    }

    /// Lightweight probe: a one-item search tells us whether the
    /// cached token is still accepted.
    async fn is_token_valid(&self, token: &str) -> Result<bool, PollError> {
        let response = self
            .http_client
            .get(format!("{}/search", self.api_base_url))
            .bearer_auth(token)
            .query(&[("q", "test"), ("type", "track"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| PollError::RemoteUnavailable(e.to_string()))?;

        match response.status().as_u16() {
            200 => Ok(true),
            401 => Ok(false),
            status => Err(PollError::RemoteUnavailable(format!(
                "probe returned {status}"
            ))),
        }
    }

    /// Return a working bearer token, exchanging a new one if the
    /// cached token is missing or rejected.
    async fn ensure_token(&self) -> Result<String, PollError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if self.is_token_valid(token).await? {
                return Ok(token.clone());
            }
            tracing::debug!("Cached catalog token expired");
        }

        let token = self.exchange_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn search_request(
        &self,
        token: &str,
        query: &str,
    ) -> Result<Option<TrackItem>, PollError> {
        let response = self
            .http_client
            .get(format!("{}/search", self.api_base_url))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| PollError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PollError::RemoteUnavailable(format!(
                "{status}: {error_text}"
            )));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| PollError::RemoteUnavailable(format!("search parse failed: {e}")))?;

        Ok(results.tracks.items.into_iter().next())
    }

    fn convert_track(item: TrackItem) -> CatalogTrack {
        let album_image = largest_image(&item.album.images);

        CatalogTrack {
            id: item.id,
            name: item.name,
            duration_ms: item.duration_ms,
            popularity: item.popularity,
            artists: item.artists.into_iter().map(convert_artist).collect(),
            album: CatalogAlbum {
                id: item.album.id,
                name: item.album.name,
                release_date: item.album.release_date,
                artists: item.album.artists.into_iter().map(convert_artist).collect(),
                image_url: album_image.clone(),
            },
            image_url: album_image,
        }
    }
}

fn convert_artist(item: ArtistItem) -> CatalogArtist {
    CatalogArtist {
        id: item.id,
        name: item.name,
        image_url: None,
    }
}

/// Pick the largest-width image from a catalog image list
fn largest_image(images: &[ImageItem]) -> Option<String> {
    images
        .iter()
        .max_by_key(|image| image.width.unwrap_or(0))
        .map(|image| image.url.clone())
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn search_track(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<(CatalogTrack, MatchTier)>, PollError> {
        let token = self.ensure_token().await?;

        // Tier 1: structured field query
        let strict = format!("track:{title} artist:{artist}");
        if let Some(item) = self.search_request(&token, &strict).await? {
            return Ok(Some((Self::convert_track(item), MatchTier::Strict)));
        }

        // Tier 2: free-text fallback combining both terms
        let loose = format!("{title} {artist}");
        if let Some(item) = self.search_request(&token, &loose).await? {
            return Ok(Some((Self::convert_track(item), MatchTier::Loose)));
        }

        Ok(None)
    }

    async fn artist_images(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, PollError> {
        let token = self.ensure_token().await?;

        // Every requested id gets an entry; lookups fill them in
        let mut images: HashMap<String, Option<String>> =
            ids.iter().map(|id| (id.clone(), None)).collect();

        for chunk in ids.chunks(ARTIST_BATCH_SIZE) {
            let response = self
                .http_client
                .get(format!("{}/artists", self.api_base_url))
                .bearer_auth(&token)
                .query(&[("ids", chunk.join(","))])
                .send()
                .await
                .map_err(|e| PollError::RemoteUnavailable(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(PollError::RemoteUnavailable(format!(
                    "{status}: {error_text}"
                )));
            }

            let results: ArtistsResponse = response
                .json()
                .await
                .map_err(|e| PollError::RemoteUnavailable(format!("artists parse failed: {e}")))?;

            for artist in results.artists.into_iter().flatten() {
                images.insert(artist.id, largest_image(&artist.images));
            }
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_image_by_width() {
        let images = vec![
            ImageItem {
                url: "http://img/64.jpg".to_string(),
                width: Some(64),
            },
            ImageItem {
                url: "http://img/640.jpg".to_string(),
                width: Some(640),
            },
            ImageItem {
                url: "http://img/300.jpg".to_string(),
                width: Some(300),
            },
        ];

        assert_eq!(largest_image(&images).as_deref(), Some("http://img/640.jpg"));
        assert_eq!(largest_image(&[]), None);
    }

    #[test]
    fn test_convert_track_carries_album_art() {
        let item = TrackItem {
            id: "t1".to_string(),
            name: "Song".to_string(),
            duration_ms: 180_000,
            popularity: 55,
            artists: vec![ArtistItem {
                id: "a1".to_string(),
                name: "Artist".to_string(),
            }],
            album: AlbumItem {
                id: "al1".to_string(),
                name: "Album".to_string(),
                release_date: Some("2019-03-01".to_string()),
                artists: vec![ArtistItem {
                    id: "a1".to_string(),
                    name: "Artist".to_string(),
                }],
                images: vec![
                    ImageItem {
                        url: "http://img/small.jpg".to_string(),
                        width: Some(64),
                    },
                    ImageItem {
                        url: "http://img/big.jpg".to_string(),
                        width: Some(640),
                    },
                ],
            },
        };

        let track = SpotifyClient::convert_track(item);
        assert_eq!(track.id, "t1");
        assert_eq!(track.album.image_url.as_deref(), Some("http://img/big.jpg"));
        assert_eq!(track.image_url.as_deref(), Some("http://img/big.jpg"));
        assert_eq!(track.artists[0].image_url, None);
    }
}
