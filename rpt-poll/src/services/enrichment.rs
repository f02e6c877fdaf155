//! Enrichment resolver
//!
//! Fills in artist and album artwork (store cache first, remote
//! catalog second, recognizer payload last), extracts cross-platform
//! deep links from the recognizer's raw payload, and stamps the play
//! with station civil time.

use crate::error::PollError;
use crate::services::Catalog;
use chrono::{FixedOffset, NaiveDateTime, Utc};
use rpt_common::db;
use rpt_common::model::{CatalogTrack, EnrichedTrack};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Resolves artwork, deep links and the civil-time play timestamp
pub struct EnrichmentResolver {
    civil_offset: FixedOffset,
}

impl EnrichmentResolver {
    /// `civil_offset_hours` is the station wall-clock offset from UTC.
    /// Play timestamps are deliberately not UTC-normalized: upstream
    /// recognizer timestamps proved unreliable across daylight-saving
    /// transitions, so the station's own clock is the reference.
    pub fn new(civil_offset_hours: i32) -> Self {
        let civil_offset = FixedOffset::east_opt(civil_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self { civil_offset }
    }

    /// Current station wall-clock time
    pub fn civil_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.civil_offset).naive_local()
    }

    /// Enrich a resolved catalog track using the store cache, the
    /// catalog, and the recognizer payload.
    pub async fn resolve<C>(
        &self,
        pool: &SqlitePool,
        catalog: &C,
        mut track: CatalogTrack,
        payload: &Value,
    ) -> Result<EnrichedTrack, PollError>
    where
        C: Catalog + ?Sized,
    {
        let artist_ids = track.referenced_artist_ids();

        // Cache first: well-known artists resolve without a remote call
        let mut images = db::artists::get_artist_images(pool, &artist_ids)
            .await
            .map_err(PollError::Store)?;

        let missing: Vec<String> = artist_ids
            .iter()
            .filter(|id| images.get(*id).cloned().flatten().is_none())
            .cloned()
            .collect();

        if !missing.is_empty() {
            let remote = catalog.artist_images(&missing).await?;
            for (id, url) in remote {
                if url.is_some() {
                    images.insert(id, url);
                }
            }
        }

        for artist in track
            .artists
            .iter_mut()
            .chain(track.album.artists.iter_mut())
        {
            if artist.image_url.is_none() {
                artist.image_url = images.get(&artist.id).cloned().flatten();
            }
        }

        // Album artwork: catalog image first, recognizer cover art as
        // fallback; background art covers the primary artist only.
        let cover = cover_art(payload);
        if track.album.image_url.is_none() {
            track.album.image_url = cover.clone();
        }
        if track.image_url.is_none() {
            track.image_url = track.album.image_url.clone().or(cover);
        }
        if let Some(primary) = track.artists.first_mut() {
            if primary.image_url.is_none() {
                primary.image_url = background_art(payload);
            }
        }

        let external_links = extract_deep_links(payload);

        Ok(EnrichedTrack {
            track,
            external_links,
            played_at: self.civil_now(),
        })
    }
}

fn cover_art(payload: &Value) -> Option<String> {
    payload
        .pointer("/track/images/coverart")?
        .as_str()
        .map(|s| s.to_string())
}

fn background_art(payload: &Value) -> Option<String> {
    payload
        .pointer("/track/images/background")?
        .as_str()
        .map(|s| s.to_string())
}

/// Collect per-platform "open in" links from the recognizer payload.
/// Missing links are simply absent, never empty strings.
fn extract_deep_links(payload: &Value) -> BTreeMap<String, String> {
    let mut links = BTreeMap::new();

    if let Some(providers) = payload
        .pointer("/track/hub/providers")
        .and_then(Value::as_array)
    {
        for provider in providers {
            let Some(platform) = provider.get("type").and_then(Value::as_str) else {
                continue;
            };
            let Some(actions) = provider.get("actions").and_then(Value::as_array) else {
                continue;
            };
            let Some(uri) = actions
                .iter()
                .find_map(|action| action.get("uri").and_then(Value::as_str))
            else {
                continue;
            };

            if let Some(link) = normalize_link(uri) {
                links.insert(platform.to_lowercase(), link);
            }
        }
    }

    if let Some(url) = payload.pointer("/track/url").and_then(Value::as_str) {
        if let Some(link) = normalize_link(url) {
            links.entry("shazam".to_string()).or_insert(link);
        }
    }

    links
}

/// Turn an "open in" URI into a direct URL.
///
/// Intent-style URIs (`intent://host/path#Intent;scheme=spotify;end`)
/// are rebuilt as `spotify://host/path`; anything from the first `&`
/// onward (tracking parameters) is stripped.
fn normalize_link(uri: &str) -> Option<String> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }

    let direct = match uri.strip_prefix("intent://") {
        Some(rest) => {
            let (opaque, meta) = rest.split_once("#Intent;")?;
            let scheme = meta
                .split(';')
                .find_map(|part| part.strip_prefix("scheme="))?;
            format!("{scheme}://{opaque}")
        }
        None => uri.to_string(),
    };

    let direct = direct.split('&').next().unwrap_or_default();
    if direct.is_empty() {
        None
    } else {
        Some(direct.to_string())
    }
}
