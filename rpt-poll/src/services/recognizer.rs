//! Audio-fingerprint recognition client
//!
//! Wraps a single call to the remote identification service. The raw
//! response is kept alongside the (title, artist) pair because
//! enrichment later mines it for artwork and deep links.

use crate::error::PollError;
use crate::services::Recognizer;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rpt_common::model::RecognizedSample;
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote recognizer client (Shazam-compatible detection endpoint)
pub struct RecognizerClient {
    http_client: reqwest::Client,
    url: String,
    api_key: String,
}

impl RecognizerClient {
    pub fn new(url: String, api_key: String) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PollError::Recognizer(e.to_string()))?;

        Ok(Self {
            http_client,
            url,
            api_key,
        })
    }

    /// Pull (title, artist) out of a recognition response. A payload
    /// without a track section is a no-match.
    fn parse_response(payload: serde_json::Value) -> Option<RecognizedSample> {
        let track = payload.get("track")?;
        let title = track.get("title")?.as_str()?.to_string();
        let artist = track.get("subtitle")?.as_str()?.to_string();

        Some(RecognizedSample {
            title,
            artist,
            payload,
        })
    }
}

#[async_trait]
impl Recognizer for RecognizerClient {
    async fn identify(&self, sample: &Path) -> Result<Option<RecognizedSample>, PollError> {
        let audio = tokio::fs::read(sample)
            .await
            .map_err(|e| PollError::Recognizer(format!("read sample failed: {e}")))?;

        let response = self
            .http_client
            .post(&self.url)
            .header("X-Api-Key", &self.api_key)
            .header("Content-Type", "text/plain")
            .body(BASE64.encode(&audio))
            .send()
            .await
            .map_err(|e| PollError::Recognizer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PollError::Recognizer(format!("{status}: {error_text}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PollError::Recognizer(format!("parse failed: {e}")))?;

        match Self::parse_response(payload) {
            Some(sample) => {
                tracing::debug!(
                    title = %sample.title,
                    artist = %sample.artist,
                    "Recognized track"
                );
                Ok(Some(sample))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_match() {
        let payload = json!({
            "track": {
                "title": "Karma Police",
                "subtitle": "Radiohead",
                "images": { "coverart": "http://img/cover.jpg" }
            }
        });

        let sample = RecognizerClient::parse_response(payload).expect("expected a match");
        assert_eq!(sample.title, "Karma Police");
        assert_eq!(sample.artist, "Radiohead");
        assert!(sample.payload.get("track").is_some());
    }

    #[test]
    fn test_parse_no_match_is_none() {
        // Talk segment / ambient noise: response carries no track
        let payload = json!({ "matches": [] });
        assert!(RecognizerClient::parse_response(payload).is_none());
    }

    #[test]
    fn test_parse_track_without_title_is_none() {
        let payload = json!({ "track": { "subtitle": "Radiohead" } });
        assert!(RecognizerClient::parse_response(payload).is_none());
    }
}
