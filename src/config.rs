use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub personalization: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_path: String,
    pub rollover_poll_secs: u64,
    pub scorer: ScorerConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let scorer = ScorerConfig {
            endpoint: std::env::var("AI_SCORER_URL").ok().filter(|v| !v.is_empty()),
            timeout_ms: std::env::var("AI_SCORER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000),
            personalization: std::env::var("PERSONALIZED_SCORING")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
        };
        let sync = SyncConfig {
            base_url: std::env::var("SYNC_BASE_URL").ok().filter(|v| !v.is_empty()),
            timeout_ms: std::env::var("SYNC_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15_000),
        };
        Self {
            data_path: std::env::var("DATA_PATH").unwrap_or_else(|_| "mealmood_state.json".into()),
            rollover_poll_secs: std::env::var("ROLLOVER_POLL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
            scorer,
            sync,
        }
    }

    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.scorer.timeout_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.timeout_ms)
    }

    pub fn rollover_poll_interval(&self) -> Duration {
        Duration::from_secs(self.rollover_poll_secs.max(1))
    }
}
