//! Live stream sampler
//!
//! Downloads a wall-clock-bounded audio snippet from a station's
//! stream into a station-scoped temp file. The connect timeout is kept
//! far below the read timeout so a station that is down is
//! distinguishable from one that is merely slow.

use crate::error::PollError;
use crate::services::SampleSource;
use async_trait::async_trait;
use rpt_common::config::StationConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(65);

/// HTTP stream sampler
pub struct HttpStreamSampler {
    http_client: reqwest::Client,
    work_dir: PathBuf,
    sample_seconds: u64,
}

impl HttpStreamSampler {
    pub fn new(work_dir: PathBuf, sample_seconds: u64) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| PollError::StreamUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            work_dir,
            sample_seconds,
        })
    }

    /// Station-scoped temp file, overwritten on every capture
    pub fn sample_path(&self, station_name: &str) -> PathBuf {
        self.work_dir.join(format!("stream_{station_name}.mp3"))
    }

    /// Read chunks until the sample duration elapses or the stream
    /// ends. A mid-read failure keeps whatever was accumulated.
    async fn download(&self, stream_url: &str) -> Result<Vec<u8>, PollError> {
        let mut response = self
            .http_client
            .get(stream_url)
            .send()
            .await
            .map_err(|e| PollError::StreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PollError::StreamUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.sample_seconds);
        let mut audio = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => {
                    audio.extend_from_slice(&chunk);
                    if tokio::time::Instant::now() >= deadline {
                        break;
                    }
                }
                // Stream ended
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    if audio.is_empty() {
                        return Err(PollError::StreamUnavailable(e.to_string()));
                    }
                    tracing::debug!("Stream read ended early: {}", e);
                    break;
                }
                // Sample duration reached
                Err(_) => break,
            }
        }

        if audio.is_empty() {
            return Err(PollError::StreamUnavailable(
                "stream yielded no audio".to_string(),
            ));
        }

        Ok(audio)
    }
}

#[async_trait]
impl SampleSource for HttpStreamSampler {
    async fn capture(&self, station: &StationConfig) -> Result<PathBuf, PollError> {
        tracing::debug!(station = %station.name, url = %station.stream_url, "Capturing sample");

        let audio = self.download(&station.stream_url).await?;

        let path = self.sample_path(&station.name);
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| PollError::StreamUnavailable(e.to_string()))?;

        if let Some(trim) = station.live_intro_seconds {
            if trim > 0 {
                trim_leading(&path, trim).await?;
            }
        }

        tracing::debug!(
            station = %station.name,
            bytes = audio.len(),
            "Sample captured"
        );

        Ok(path)
    }
}

/// Re-encode the sample with the leading `trim_seconds` removed,
/// compensating for a fixed jingle/intro known per station.
async fn trim_leading(path: &Path, trim_seconds: u32) -> Result<(), PollError> {
    let trimmed = path.with_extension("trimmed.mp3");

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-ss")
        .arg(trim_seconds.to_string())
        .arg("-i")
        .arg(path)
        .arg("-acodec")
        .arg("copy")
        .arg(&trimmed)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map_err(|e| PollError::TrimFailed(format!("ffmpeg spawn failed: {e}")))?;

    if !status.success() {
        return Err(PollError::TrimFailed(format!(
            "ffmpeg exited with {status}"
        )));
    }

    tokio::fs::rename(&trimmed, path)
        .await
        .map_err(|e| PollError::TrimFailed(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_path_is_station_scoped() {
        let sampler = HttpStreamSampler::new(PathBuf::from("/tmp"), 10).unwrap();

        assert_eq!(
            sampler.sample_path("glglz"),
            PathBuf::from("/tmp/stream_glglz.mp3")
        );
        assert_ne!(sampler.sample_path("glglz"), sampler.sample_path("eco99"));
    }

    #[tokio::test]
    async fn test_unreachable_stream_fails_fast() {
        let sampler = HttpStreamSampler::new(std::env::temp_dir(), 1).unwrap();
        let station = StationConfig {
            name: "dead".to_string(),
            // Reserved TEST-NET-1 address, nothing listens there
            stream_url: "http://192.0.2.1:1/live".to_string(),
            live_intro_seconds: None,
        };

        let result = sampler.capture(&station).await;
        assert!(matches!(result, Err(PollError::StreamUnavailable(_))));
    }
}
