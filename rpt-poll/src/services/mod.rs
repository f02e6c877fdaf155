//! External service clients for the polling pipeline
//!
//! Each stage sits behind a trait so the scheduler can be exercised
//! with stubs: sample capture, fingerprint recognition, and catalog
//! resolution.

pub mod enrichment;
pub mod recognizer;
pub mod sampler;
pub mod spotify;

use crate::error::PollError;
use async_trait::async_trait;
use rpt_common::config::StationConfig;
use rpt_common::model::{CatalogTrack, MatchTier, RecognizedSample};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Captures a bounded-duration audio sample from a station's stream
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Download a sample and return the path of the station-scoped
    /// temp file (overwritten on each call).
    async fn capture(&self, station: &StationConfig) -> Result<PathBuf, PollError>;
}

/// Identifies a sample via a remote audio-fingerprint service
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// `Ok(None)` is a no-match: ambient noise or a talk segment,
    /// a normal outcome rather than a fault.
    async fn identify(&self, sample: &Path) -> Result<Option<RecognizedSample>, PollError>;
}

/// Resolves recognized (title, artist) pairs against the music catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Strict query first, loose free-text fallback second.
    /// `Ok(None)` means the catalog has no match at either tier.
    async fn search_track(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<(CatalogTrack, MatchTier)>, PollError>;

    /// Batched artist artwork lookup; every requested id gets an
    /// entry, `None` for artists the catalog has no image for.
    async fn artist_images(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, PollError>;
}
