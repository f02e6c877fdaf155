//! Polling scheduler
//!
//! Drives the fixed-interval cycle over all configured stations:
//! capture, recognize, resolve, de-duplicate, enrich, record. Each
//! station runs under its own deadline so one hung stream cannot
//! starve the rest of the cycle, and every failure is contained to
//! "this station, this cycle".

use crate::error::PollError;
use crate::registry::StationRegistry;
use crate::retry::RetryPolicy;
use crate::services::enrichment::EnrichmentResolver;
use crate::services::{Catalog, Recognizer, SampleSource};
use rpt_common::config::StationConfig;
use rpt_common::db;
use rpt_common::model::MatchTier;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;

/// What one station's poll concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationOutcome {
    /// A new play was recorded for this track
    Recorded { track_id: String },
    /// Same track as the previous poll, nothing recorded
    SameTrack,
    /// Recognizer heard no identifiable music (talk, ads, jingles)
    NoMatch,
    /// Recognized, but the catalog had no match at either search tier
    NotFound,
}

/// Cycle-level timing and liveness settings
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub station_timeout: Duration,
    pub heartbeat_path: Option<PathBuf>,
}

pub struct PollingScheduler<S, R, C> {
    pool: SqlitePool,
    registry: StationRegistry,
    sampler: S,
    recognizer: R,
    catalog: C,
    enricher: EnrichmentResolver,
    retry: RetryPolicy,
    settings: SchedulerSettings,
}

impl<S, R, C> PollingScheduler<S, R, C>
where
    S: SampleSource,
    R: Recognizer,
    C: Catalog,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        registry: StationRegistry,
        sampler: S,
        recognizer: R,
        catalog: C,
        enricher: EnrichmentResolver,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            pool,
            registry,
            sampler,
            recognizer,
            catalog,
            enricher,
            retry: RetryPolicy::default(),
            settings,
        }
    }

    /// Override the per-station retry policy (tests use no backoff)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Poll forever with a fixed sleep between cycles
    pub async fn run(&mut self) {
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Poll every station once. Never fails: per-station errors and
    /// timeouts are logged and skipped.
    pub async fn run_cycle(&mut self) {
        let stations = self.registry.stations().to_vec();

        for station in &stations {
            let deadline = self.settings.station_timeout;
            match tokio::time::timeout(deadline, self.poll_station(station)).await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(station = %station.name, ?outcome, "Station polled");
                }
                Ok(Err(e)) => {
                    tracing::warn!(station = %station.name, error = %e, "Station poll failed");
                }
                Err(_) => {
                    tracing::warn!(
                        station = %station.name,
                        timeout_seconds = deadline.as_secs(),
                        "Station poll timed out"
                    );
                }
            }
        }

        self.touch_heartbeat().await;
    }

    /// One station's poll, with bounded in-cycle retry for transient
    /// faults. De-dup state advances only on a successful record.
    async fn poll_station(&mut self, station: &StationConfig) -> Result<StationOutcome, PollError> {
        let outcome = {
            let this = &*self;
            this.retry.run(|| this.attempt_station(station)).await?
        };

        if let StationOutcome::Recorded { track_id } = &outcome {
            self.registry
                .mark_recorded(&self.pool, &station.name, track_id)
                .await?;
        }

        Ok(outcome)
    }

    async fn attempt_station(&self, station: &StationConfig) -> Result<StationOutcome, PollError> {
        let sample_path = self.sampler.capture(station).await?;

        let Some(sample) = self.recognizer.identify(&sample_path).await? else {
            tracing::debug!(station = %station.name, "No identifiable music");
            return Ok(StationOutcome::NoMatch);
        };

        let Some((track, tier)) = self
            .catalog
            .search_track(&sample.title, &sample.artist)
            .await?
        else {
            tracing::warn!(
                station = %station.name,
                title = %sample.title,
                artist = %sample.artist,
                "Recognized track not found in catalog"
            );
            return Ok(StationOutcome::NotFound);
        };

        if tier == MatchTier::Loose {
            // Free-text matches are recorded but flagged, since they
            // occasionally land on covers or remasters
            tracing::info!(
                station = %station.name,
                title = %sample.title,
                artist = %sample.artist,
                track_id = %track.id,
                "Catalog match via free-text fallback"
            );
        }

        // De-dup before enrichment: a still-playing track costs no
        // further catalog calls
        if self.registry.last_recorded(&station.name) == Some(track.id.as_str()) {
            tracing::debug!(station = %station.name, track_id = %track.id, "Same track still playing");
            return Ok(StationOutcome::SameTrack);
        }

        let enriched = self
            .enricher
            .resolve(&self.pool, &self.catalog, track, &sample.payload)
            .await?;

        db::songs::record_track(&self.pool, &enriched).await?;

        let station_id = db::plays::get_or_create_station(&self.pool, &station.name).await?;
        let new_play =
            db::plays::record_play(&self.pool, &enriched.track.id, station_id, enriched.played_at)
                .await?;

        tracing::info!(
            station = %station.name,
            track_id = %enriched.track.id,
            title = %enriched.track.name,
            played_at = %enriched.played_at,
            tier = tier.as_number(),
            new_play,
            "Play recorded"
        );

        Ok(StationOutcome::Recorded {
            track_id: enriched.track.id,
        })
    }

    /// Touch the liveness file after a completed cycle; a stale mtime
    /// tells an external watchdog the poller is stuck.
    async fn touch_heartbeat(&self) {
        let Some(path) = &self.settings.heartbeat_path else {
            return;
        };

        let stamp = chrono::Utc::now().to_rfc3339();
        if let Err(e) = tokio::fs::write(path, stamp).await {
            tracing::warn!(path = %path.display(), error = %e, "Heartbeat write failed");
        }
    }
}
