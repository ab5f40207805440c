//! Session orchestration: owns the current day's working set, recomputes
//! scores and mood on every meal edit, archives the outgoing day on rollover
//! and mirrors state to persistence and the cloud.
//!
//! All mutation is serialized through one async mutex (single writer); the
//! rollover poll task takes the same lock as foreground edits. The only
//! suspending operation per edit is the optional remote refinement, which
//! runs detached and is tagged with a per-meal edit generation so stale
//! responses are discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::archive::{day_key, local_offset, DailySnapshot, HistoricalArchive};
use crate::config::AppConfig;
use crate::meal::{MealEntry, MealType};
use crate::mood::{self, MoodState};
use crate::persistence::{FileStore, PersistedState, PersistenceStore};
use crate::profile::{build_profile, MetricsSource, UserHealthProfile};
use crate::scoring::{CompositeScorer, HeuristicScorer, MealAnalysis, RemoteScorer, Scorer};
use crate::sync::{CloudSync, HttpCloudSync, SyncError};

struct SessionInner {
    meals: Vec<MealEntry>,
    mood_state: MoodState,
    last_reset: OffsetDateTime,
    archive: HistoricalArchive,
    // Monotonic per-meal edit counters; a refinement result is applied only
    // if its generation still matches.
    edit_generations: HashMap<Uuid, u64>,
}

impl SessionInner {
    fn bump_generation(&mut self, meal_id: Uuid) -> u64 {
        let counter = self.edit_generations.entry(meal_id).or_insert(0);
        *counter += 1;
        *counter
    }

    fn to_persisted(&self) -> PersistedState {
        PersistedState::new(
            self.meals.clone(),
            self.mood_state,
            self.last_reset,
            self.archive.clone(),
        )
    }
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<SessionInner>>,
    store: Arc<dyn PersistenceStore>,
    scorer: Arc<dyn Scorer>,
    metrics: Arc<dyn MetricsSource + Send + Sync>,
    cloud: Option<Arc<dyn CloudSync>>,
    offset: UtcOffset,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        scorer: Arc<dyn Scorer>,
        metrics: Arc<dyn MetricsSource + Send + Sync>,
        cloud: Option<Arc<dyn CloudSync>>,
        offset: UtcOffset,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                meals: Vec::new(),
                mood_state: MoodState::neutral(),
                last_reset: OffsetDateTime::now_utc(),
                archive: HistoricalArchive::new(),
                edit_generations: HashMap::new(),
            })),
            store,
            scorer,
            metrics,
            cloud,
            offset,
        }
    }

    /// Wires the default production sinks from config: JSON file store,
    /// heuristic scorer with optional remote refinement, optional HTTP cloud
    /// sync, and the local calendar offset.
    pub fn from_config(
        config: &AppConfig,
        metrics: Arc<dyn MetricsSource + Send + Sync>,
    ) -> Self {
        let store: Arc<dyn PersistenceStore> = Arc::new(FileStore::new(&config.data_path));
        let heuristic = HeuristicScorer::new(config.scorer.personalization);
        let scorer: Arc<dyn Scorer> = match &config.scorer.endpoint {
            Some(endpoint) => Arc::new(CompositeScorer::new(
                heuristic,
                RemoteScorer::new(endpoint.clone(), Some(config.scorer_timeout())),
            )),
            None => Arc::new(heuristic),
        };
        let cloud = config.sync.base_url.as_ref().map(|base| {
            Arc::new(HttpCloudSync::new(base.clone(), Some(config.sync_timeout())))
                as Arc<dyn CloudSync>
        });
        Self::new(store, scorer, metrics, cloud, local_offset())
    }

    /// Loads persisted state (tolerating a missing or unreadable file) and
    /// runs the first rollover check.
    pub async fn initialize(&self) {
        match self.store.load().await {
            Ok(Some(persisted)) => {
                let mut inner = self.inner.lock().await;
                inner.meals = persisted.meals;
                inner.mood_state = persisted.mood_state;
                inner.last_reset = persisted.last_reset;
                inner.archive = persisted.archive;
                info!(
                    meals = inner.meals.len(),
                    archived_days = inner.archive.len(),
                    "session state loaded"
                );
            }
            Ok(None) => debug!("no persisted session state"),
            Err(e) => warn!(error = %e, "failed to load session state, starting fresh"),
        }
        self.check_rollover(OffsetDateTime::now_utc()).await;
    }

    fn profile(&self) -> Option<UserHealthProfile> {
        build_profile(self.metrics.as_ref())
    }

    pub async fn meals(&self) -> Vec<MealEntry> {
        self.inner.lock().await.meals.clone()
    }

    pub async fn mood_state(&self) -> MoodState {
        self.inner.lock().await.mood_state
    }

    pub async fn archive(&self) -> HistoricalArchive {
        self.inner.lock().await.archive.clone()
    }

    /// Creates a meal, scores it and advances the mood state. Returns the new
    /// meal's id.
    pub async fn add_meal(&self, meal_type: MealType, items: Vec<String>) -> Uuid {
        let profile = self.profile();
        let mut inner = self.inner.lock().await;

        let mut meal = MealEntry::new(meal_type, items);
        meal.health_score = self.scorer.score(&meal.description(), profile.as_ref());
        let meal_id = meal.id;
        let description = meal.description();
        inner.meals.push(meal);
        let generation = inner.bump_generation(meal_id);
        self.persist(&inner);

        Self::recompute(&mut inner, profile.as_ref());
        self.persist(&inner);
        drop(inner);

        self.spawn_refinement(meal_id, generation, description);
        meal_id
    }

    /// Applies a committed edit: items (and optionally type) change, the
    /// heuristic score is recomputed synchronously, and a detached refinement
    /// is kicked off. Returns false for an unknown meal id.
    ///
    /// Callers debounce text input; this runs once per committed edit, not
    /// per keystroke.
    pub async fn edit_meal(
        &self,
        meal_id: Uuid,
        new_items: Vec<String>,
        new_type: Option<MealType>,
    ) -> bool {
        let profile = self.profile();
        let mut inner = self.inner.lock().await;

        let Some(meal) = inner.meals.iter_mut().find(|m| m.id == meal_id) else {
            return false;
        };
        meal.items = new_items;
        if let Some(meal_type) = new_type {
            meal.meal_type = meal_type;
        }
        meal.health_score = self.scorer.score(&meal.description(), profile.as_ref());
        let description = meal.description();
        let generation = inner.bump_generation(meal_id);
        self.persist(&inner);

        Self::recompute(&mut inner, profile.as_ref());
        self.persist(&inner);
        drop(inner);

        self.spawn_refinement(meal_id, generation, description);
        true
    }

    /// Removes a meal. An empty working set resets the mood outright instead
    /// of running a transition.
    pub async fn delete_meal(&self, meal_id: Uuid) -> bool {
        let profile = self.profile();
        let mut inner = self.inner.lock().await;

        let before = inner.meals.len();
        inner.meals.retain(|m| m.id != meal_id);
        if inner.meals.len() == before {
            return false;
        }
        inner.edit_generations.remove(&meal_id);

        Self::recompute(&mut inner, profile.as_ref());
        self.persist(&inner);
        true
    }

    /// Archives the outgoing day and clears the working set when `now` falls
    /// on a different calendar day than the last reset.
    pub async fn check_rollover(&self, now: OffsetDateTime) {
        let mut inner = self.inner.lock().await;
        let today = day_key(now, self.offset);
        let working_day = day_key(inner.last_reset, self.offset);
        if today == working_day {
            return;
        }

        let outgoing = std::mem::take(&mut inner.meals);
        let snapshot = DailySnapshot::new(working_day, inner.mood_state, outgoing);
        info!(
            day = %snapshot.date,
            meals = snapshot.meal_count,
            "archiving outgoing day"
        );
        inner.archive.upsert(snapshot);

        inner.mood_state = MoodState::neutral();
        inner.last_reset = now;
        inner.edit_generations.clear();
        self.persist(&inner);
    }

    /// Background rollover poll; takes the same mutation lock as foreground
    /// edits on every tick.
    pub fn spawn_rollover_task(&self, period: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                controller.check_rollover(OffsetDateTime::now_utc()).await;
            }
        })
    }

    /// Uploads all archived snapshots, one round-trip at a time; the first
    /// failure aborts the rest. Requires a signed-in user. Returns the number
    /// of snapshots uploaded.
    pub async fn sync_now(&self, user_id: Option<&str>) -> Result<usize, SyncError> {
        let Some(cloud) = self.cloud.as_ref() else {
            return Err(SyncError::NotConfigured);
        };
        let Some(user_id) = user_id else {
            return Err(SyncError::AuthRequired);
        };

        let snapshots = self.inner.lock().await.archive.snapshots.clone();
        let mut uploaded = 0;
        for snapshot in &snapshots {
            cloud.upload(user_id, snapshot).await?;
            uploaded += 1;
        }

        let mut inner = self.inner.lock().await;
        inner.archive.last_sync_date = Some(OffsetDateTime::now_utc());
        self.persist(&inner);
        info!(uploaded, "cloud sync complete");
        Ok(uploaded)
    }

    /// Pulls the cloud archive and merges it into the local one; a remote day
    /// replaces a local snapshot with the same key. Returns the number of
    /// snapshots fetched.
    pub async fn import_remote(&self, user_id: Option<&str>) -> Result<usize, SyncError> {
        let Some(cloud) = self.cloud.as_ref() else {
            return Err(SyncError::NotConfigured);
        };
        let Some(user_id) = user_id else {
            return Err(SyncError::AuthRequired);
        };

        let snapshots = cloud.fetch_all(user_id).await?;
        let fetched = snapshots.len();
        let mut inner = self.inner.lock().await;
        for snapshot in snapshots {
            inner.archive.upsert(snapshot);
        }
        self.persist(&inner);
        info!(fetched, "cloud import complete");
        Ok(fetched)
    }

    /// Whole-day aggregate plus one mood transition. An empty working set
    /// resets to neutral without a transition.
    fn recompute(inner: &mut SessionInner, profile: Option<&UserHealthProfile>) {
        if inner.meals.is_empty() {
            inner.mood_state = MoodState::neutral();
            return;
        }
        let aggregate = inner.meals.iter().map(|m| m.health_score).sum::<f64>()
            / inner.meals.len() as f64;
        let sensitivity = profile.map_or(1.0, |p| p.sensitivity_multiplier);
        inner.mood_state = mood::transition(inner.mood_state, aggregate, sensitivity);
    }

    // Fire-and-forget mirror write; failures are logged and dropped.
    fn persist(&self, inner: &SessionInner) {
        let state = inner.to_persisted();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.save(&state).await {
                warn!(error = %e, "failed to persist session state");
            }
        });
    }

    fn spawn_refinement(&self, meal_id: Uuid, generation: u64, description: String) {
        if self.scorer.refiner().is_none() {
            return;
        }
        let controller = self.clone();
        tokio::spawn(async move {
            let Some(refiner) = controller.scorer.refiner() else {
                return;
            };
            match refiner.analyze(&description).await {
                Ok(analysis) => {
                    controller
                        .apply_refinement(meal_id, generation, analysis)
                        .await;
                }
                // The heuristic score already applied stands; no retry.
                Err(e) => warn!(%meal_id, error = %e, "score refinement failed"),
            }
        });
    }

    /// Applies an async refinement result unless the meal has been edited
    /// again (stale generation) or deleted in the meantime.
    async fn apply_refinement(&self, meal_id: Uuid, generation: u64, analysis: MealAnalysis) {
        let profile = self.profile();
        let mut inner = self.inner.lock().await;

        if inner.edit_generations.get(&meal_id) != Some(&generation) {
            debug!(%meal_id, generation, "discarding stale refinement");
            return;
        }
        let Some(meal) = inner.meals.iter_mut().find(|m| m.id == meal_id) else {
            return;
        };
        meal.health_score = analysis.health_score.clamp(0.0, 1.0);

        Self::recompute(&mut inner, profile.as_ref());
        self.persist(&inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;
    use crate::scoring::{AnalyzeError, CompositeScorer, HeuristicScorer, ScoreRefiner};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::offset;

    struct MemoryStore {
        state: std::sync::Mutex<Option<PersistedState>>,
    }

    impl MemoryStore {
        fn new(state: Option<PersistedState>) -> Arc<Self> {
            Arc::new(Self {
                state: std::sync::Mutex::new(state),
            })
        }
    }

    #[async_trait]
    impl PersistenceStore for MemoryStore {
        async fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
            *self.state.lock().unwrap() = Some(state.clone());
            Ok(())
        }

        async fn load(&self) -> anyhow::Result<Option<PersistedState>> {
            Ok(self.state.lock().unwrap().clone())
        }
    }

    struct FixedRefiner {
        score: f64,
    }

    #[async_trait]
    impl ScoreRefiner for FixedRefiner {
        async fn analyze(&self, _description: &str) -> Result<MealAnalysis, AnalyzeError> {
            Ok(MealAnalysis {
                health_score: self.score,
                mood: "serene".into(),
                sound: "tink".into(),
            })
        }
    }

    struct FailingCloud {
        fail_after: usize,
        uploads: AtomicUsize,
        remote: Vec<DailySnapshot>,
    }

    impl FailingCloud {
        fn reliable() -> Self {
            Self {
                fail_after: usize::MAX,
                uploads: AtomicUsize::new(0),
                remote: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CloudSync for FailingCloud {
        async fn upload(&self, _user_id: &str, _snapshot: &DailySnapshot) -> Result<(), SyncError> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_after {
                return Err(SyncError::HttpStatus {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    body: "boom".into(),
                });
            }
            Ok(())
        }

        async fn fetch_all(&self, _user_id: &str) -> Result<Vec<DailySnapshot>, SyncError> {
            Ok(self.remote.clone())
        }
    }

    fn controller_with(
        store: Arc<dyn PersistenceStore>,
        cloud: Option<Arc<dyn CloudSync>>,
    ) -> SessionController {
        SessionController::new(
            store,
            Arc::new(HeuristicScorer::default()),
            Arc::new(HashMap::<String, String>::new()),
            cloud,
            offset!(UTC),
        )
    }

    #[tokio::test]
    async fn add_meal_scores_and_transitions() {
        let controller = controller_with(MemoryStore::new(None), None);
        controller
            .add_meal(MealType::Lunch, vec!["Green salad with avocado".into()])
            .await;

        let meals = controller.meals().await;
        assert_eq!(meals.len(), 1);
        assert!((meals[0].health_score - 0.7).abs() < 1e-9);

        let mood = controller.mood_state().await;
        assert_eq!(mood.mood, Mood::Serene);
        assert!((mood.scale - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn edit_meal_rescales_mood() {
        let controller = controller_with(MemoryStore::new(None), None);
        let id = controller
            .add_meal(MealType::Dinner, vec!["grilled salmon".into()])
            .await;

        let edited = controller
            .edit_meal(id, vec!["fried chicken and fries".into()], None)
            .await;
        assert!(edited);

        let meals = controller.meals().await;
        assert!((meals[0].health_score - 0.3).abs() < 1e-9);
        assert_eq!(controller.mood_state().await.mood, Mood::Overwhelmed);
    }

    #[tokio::test]
    async fn edit_unknown_meal_is_noop() {
        let controller = controller_with(MemoryStore::new(None), None);
        assert!(!controller.edit_meal(Uuid::new_v4(), vec![], None).await);
    }

    #[tokio::test]
    async fn delete_last_meal_resets_mood() {
        let controller = controller_with(MemoryStore::new(None), None);
        let id = controller
            .add_meal(MealType::Snacks, vec!["chips and soda".into()])
            .await;
        assert_eq!(controller.mood_state().await.mood, Mood::Overwhelmed);

        assert!(controller.delete_meal(id).await);
        let mood = controller.mood_state().await;
        assert_eq!(mood, MoodState::neutral());
        assert!(controller.meals().await.is_empty());
    }

    #[tokio::test]
    async fn rollover_archives_outgoing_day() {
        let controller = controller_with(MemoryStore::new(None), None);
        controller
            .add_meal(MealType::Breakfast, vec!["oatmeal".into()])
            .await;

        let now = OffsetDateTime::now_utc();
        controller.check_rollover(now + time::Duration::days(1)).await;

        assert!(controller.meals().await.is_empty());
        assert_eq!(controller.mood_state().await, MoodState::neutral());

        let archive = controller.archive().await;
        assert_eq!(archive.len(), 1);
        let snapshot = &archive.snapshots[0];
        assert_eq!(snapshot.date, day_key(now, offset!(UTC)));
        assert_eq!(snapshot.meal_count, 1);
    }

    #[tokio::test]
    async fn rollover_same_day_is_noop() {
        let controller = controller_with(MemoryStore::new(None), None);
        controller
            .add_meal(MealType::Breakfast, vec!["oatmeal".into()])
            .await;
        controller.check_rollover(OffsetDateTime::now_utc()).await;
        assert_eq!(controller.meals().await.len(), 1);
        assert!(controller.archive().await.is_empty());
    }

    #[tokio::test]
    async fn initialize_restores_persisted_state() {
        let now = OffsetDateTime::now_utc();
        let mut meal = MealEntry::new(MealType::Lunch, vec!["salad".into()]);
        meal.health_score = 0.7;
        let persisted = PersistedState::new(
            vec![meal],
            MoodState {
                scale: 1.4,
                mood: Mood::Overwhelmed,
            },
            now,
            HistoricalArchive::new(),
        );

        let controller = controller_with(MemoryStore::new(Some(persisted)), None);
        controller.initialize().await;

        assert_eq!(controller.meals().await.len(), 1);
        assert!((controller.mood_state().await.scale - 1.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stale_refinement_is_discarded() {
        let controller = controller_with(MemoryStore::new(None), None);
        let id = controller
            .add_meal(MealType::Lunch, vec!["salad".into()])
            .await;
        // add = generation 1, edit = generation 2
        controller.edit_meal(id, vec!["pizza".into()], None).await;
        let score_after_edit = controller.meals().await[0].health_score;

        let stale = MealAnalysis {
            health_score: 0.95,
            mood: "serene".into(),
            sound: "tink".into(),
        };
        controller.apply_refinement(id, 1, stale).await;
        assert!((controller.meals().await[0].health_score - score_after_edit).abs() < 1e-9);

        let current = MealAnalysis {
            health_score: 0.95,
            mood: "serene".into(),
            sound: "tink".into(),
        };
        controller.apply_refinement(id, 2, current).await;
        assert!((controller.meals().await[0].health_score - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refinement_overwrites_heuristic_score() {
        let scorer = CompositeScorer::new(
            HeuristicScorer::default(),
            FixedRefiner { score: 0.9 },
        );
        let controller = SessionController::new(
            MemoryStore::new(None),
            Arc::new(scorer),
            Arc::new(HashMap::<String, String>::new()),
            None,
            offset!(UTC),
        );

        let id = controller
            .add_meal(MealType::Dinner, vec!["pizza".into()])
            .await;
        // let the detached refinement task run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let meals = controller.meals().await;
        assert_eq!(meals[0].id, id);
        assert!((meals[0].health_score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn from_config_wires_optional_sinks() {
        let config = AppConfig {
            data_path: "state.json".into(),
            rollover_poll_secs: 60,
            scorer: crate::config::ScorerConfig {
                endpoint: Some("http://localhost:9999/analyze".into()),
                timeout_ms: 1000,
                personalization: true,
            },
            sync: crate::config::SyncConfig {
                base_url: None,
                timeout_ms: 1000,
            },
        };
        let controller =
            SessionController::from_config(&config, Arc::new(HashMap::<String, String>::new()));
        assert!(controller.scorer.refiner().is_some());
        assert!(controller.cloud.is_none());
    }

    #[tokio::test]
    async fn sync_requires_signed_in_user() {
        let cloud: Arc<dyn CloudSync> = Arc::new(FailingCloud::reliable());
        let controller = controller_with(MemoryStore::new(None), Some(cloud));
        let err = controller.sync_now(None).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthRequired));
        let err = controller.import_remote(None).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthRequired));
    }

    #[tokio::test]
    async fn sync_without_cloud_is_not_configured() {
        let controller = controller_with(MemoryStore::new(None), None);
        let err = controller.sync_now(Some("user-1")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured));
    }

    #[tokio::test]
    async fn import_merges_remote_snapshots() {
        let remote_day = time::macros::date!(2024 - 05 - 01);
        let remote = vec![DailySnapshot::new(
            remote_day,
            MoodState::neutral(),
            Vec::new(),
        )];
        let cloud: Arc<dyn CloudSync> = Arc::new(FailingCloud {
            fail_after: usize::MAX,
            uploads: AtomicUsize::new(0),
            remote,
        });
        let controller = controller_with(MemoryStore::new(None), Some(cloud));

        let fetched = controller
            .import_remote(Some("user-1"))
            .await
            .expect("import should succeed");
        assert_eq!(fetched, 1);
        assert!(controller.archive().await.get(remote_day).is_some());
    }

    #[tokio::test]
    async fn sync_aborts_on_first_failure() {
        let cloud = Arc::new(FailingCloud {
            fail_after: 1,
            uploads: AtomicUsize::new(0),
            remote: Vec::new(),
        });
        let controller = controller_with(MemoryStore::new(None), Some(cloud.clone()));
        controller
            .add_meal(MealType::Breakfast, vec!["oatmeal".into()])
            .await;

        // two archived days
        let now = OffsetDateTime::now_utc();
        controller.check_rollover(now + time::Duration::days(1)).await;
        controller
            .add_meal(MealType::Lunch, vec!["salad".into()])
            .await;
        controller.check_rollover(now + time::Duration::days(2)).await;
        assert_eq!(controller.archive().await.len(), 2);

        let err = controller.sync_now(Some("user-1")).await.unwrap_err();
        assert!(matches!(err, SyncError::HttpStatus { .. }));
        // first upload succeeded, second aborted the loop
        assert_eq!(cloud.uploads.load(Ordering::SeqCst), 2);
        assert!(controller.archive().await.last_sync_date.is_none());
    }

    #[tokio::test]
    async fn sync_uploads_all_and_stamps_date() {
        let cloud = Arc::new(FailingCloud::reliable());
        let controller = controller_with(MemoryStore::new(None), Some(cloud.clone()));
        controller
            .add_meal(MealType::Breakfast, vec!["oatmeal".into()])
            .await;
        let now = OffsetDateTime::now_utc();
        controller.check_rollover(now + time::Duration::days(1)).await;

        let uploaded = controller
            .sync_now(Some("user-1"))
            .await
            .expect("sync should succeed");
        assert_eq!(uploaded, 1);
        assert!(controller.archive().await.last_sync_date.is_some());
    }
}
