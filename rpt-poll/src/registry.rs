//! Station registry
//!
//! The configured station list plus each station's last recorded
//! track id. The in-memory map mirrors the `station_state` table so
//! de-duplication works immediately after a restart without a per-poll
//! database read.

use anyhow::Result;
use rpt_common::config::StationConfig;
use rpt_common::db::station_state;
use sqlx::SqlitePool;
use std::collections::HashMap;

pub struct StationRegistry {
    stations: Vec<StationConfig>,
    last_recorded: HashMap<String, String>,
}

impl StationRegistry {
    /// Build the registry from config, seeding the de-dup state from
    /// the store.
    pub async fn load(pool: &SqlitePool, stations: Vec<StationConfig>) -> Result<Self> {
        let last_recorded = station_state::load_all(pool).await?;

        tracing::info!(
            stations = stations.len(),
            resumed = last_recorded.len(),
            "Station registry loaded"
        );

        Ok(Self {
            stations,
            last_recorded,
        })
    }

    pub fn stations(&self) -> &[StationConfig] {
        &self.stations
    }

    /// Track id most recently recorded for this station, if any
    pub fn last_recorded(&self, station_name: &str) -> Option<&str> {
        self.last_recorded.get(station_name).map(String::as_str)
    }

    /// Persist and remember a newly recorded track for a station
    pub async fn mark_recorded(
        &mut self,
        pool: &SqlitePool,
        station_name: &str,
        track_id: &str,
    ) -> Result<()> {
        station_state::set_last_track(pool, station_name, track_id).await?;
        self.last_recorded
            .insert(station_name.to_string(), track_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpt_common::db::init_memory_pool;

    fn station(name: &str) -> StationConfig {
        StationConfig {
            name: name.to_string(),
            stream_url: format!("https://{name}.example/live"),
            live_intro_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_mark_recorded_updates_memory_and_store() {
        let pool = init_memory_pool().await.unwrap();
        let mut registry = StationRegistry::load(&pool, vec![station("glglz")])
            .await
            .unwrap();

        assert_eq!(registry.last_recorded("glglz"), None);

        registry.mark_recorded(&pool, "glglz", "t1").await.unwrap();
        assert_eq!(registry.last_recorded("glglz"), Some("t1"));

        // A registry rebuilt from the same store resumes the state
        let reloaded = StationRegistry::load(&pool, vec![station("glglz")])
            .await
            .unwrap();
        assert_eq!(reloaded.last_recorded("glglz"), Some("t1"));
    }

    #[tokio::test]
    async fn test_stations_do_not_share_state() {
        let pool = init_memory_pool().await.unwrap();
        let mut registry = StationRegistry::load(&pool, vec![station("glglz"), station("eco99")])
            .await
            .unwrap();

        registry.mark_recorded(&pool, "glglz", "t1").await.unwrap();

        assert_eq!(registry.last_recorded("glglz"), Some("t1"));
        assert_eq!(registry.last_recorded("eco99"), None);
    }
}
