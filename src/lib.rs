//! Core engine for a meal-journaling app: free-text meal descriptions become
//! bounded health scores, scores drive a small mood state machine, and each
//! day's working set is archived into a day-keyed history. Embedding
//! applications wire in their own persistence, metrics and cloud sinks.

pub mod archive;
pub mod config;
pub mod logging;
pub mod meal;
pub mod mood;
pub mod persistence;
pub mod profile;
pub mod scoring;
pub mod session;
pub mod sync;

pub use archive::{day_key, day_key_string, local_offset, DailySnapshot, HistoricalArchive};
pub use config::AppConfig;
pub use meal::{MealEntry, MealType};
pub use mood::{transition, Mood, MoodState};
pub use persistence::{FileStore, PersistedState, PersistenceStore};
pub use profile::{build_profile, MetricsSource, RiskLevel, UserHealthProfile};
pub use scoring::{CompositeScorer, HeuristicScorer, RemoteScorer, Scorer};
pub use session::SessionController;
pub use sync::{CloudSync, HttpCloudSync, SyncError};
