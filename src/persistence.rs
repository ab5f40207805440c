//! Local persistence of the working set and archive.
//!
//! The in-memory session is the source of truth; saves are an asynchronous
//! mirror and load happens once at startup. The on-disk schema is version
//! tagged: a v1 payload (before the archive existed) is upgraded on load with
//! an empty archive through an explicit legacy path, not by swallowing parse
//! errors.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::archive::HistoricalArchive;
use crate::meal::MealEntry;
use crate::mood::MoodState;

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub meals: Vec<MealEntry>,
    pub mood_state: MoodState,
    #[serde(with = "time::serde::rfc3339")]
    pub last_reset: OffsetDateTime,
    pub archive: HistoricalArchive,
}

impl PersistedState {
    pub fn new(
        meals: Vec<MealEntry>,
        mood_state: MoodState,
        last_reset: OffsetDateTime,
        archive: HistoricalArchive,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION,
            meals,
            mood_state,
            last_reset,
            archive,
        }
    }
}

/// Pre-archive schema; `version` and `archive` are absent.
#[derive(Debug, Deserialize)]
struct LegacyPersistedState {
    meals: Vec<MealEntry>,
    mood_state: MoodState,
    #[serde(with = "time::serde::rfc3339")]
    last_reset: OffsetDateTime,
}

impl From<LegacyPersistedState> for PersistedState {
    fn from(legacy: LegacyPersistedState) -> Self {
        PersistedState::new(
            legacy.meals,
            legacy.mood_state,
            legacy.last_reset,
            HistoricalArchive::new(),
        )
    }
}

/// Minimal first pass that only reads the schema tag.
#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

pub fn decode(json: &str) -> anyhow::Result<PersistedState> {
    let tag: VersionProbe = serde_json::from_str(json).context("decode persisted state")?;
    if tag.version.is_some() {
        // Versioned payloads must parse as the current schema; a malformed
        // field is a real load error, not a reason to drop the archive.
        return serde_json::from_str::<PersistedState>(json).context("decode persisted state");
    }
    let legacy: LegacyPersistedState =
        serde_json::from_str(json).context("decode legacy persisted state")?;
    tracing::info!("loaded legacy snapshot schema, upgrading with empty archive");
    Ok(legacy.into())
}

#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn save(&self, state: &PersistedState) -> anyhow::Result<()>;
    async fn load(&self) -> anyhow::Result<Option<PersistedState>>;
}

/// JSON file on local disk, written via a temp file and rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
        let json = serde_json::to_vec(state).context("encode persisted state")?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename into {}", self.path.display()))?;
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Option<PersistedState>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", self.path.display())),
        };
        decode(&json).map(Some)
    }
}
