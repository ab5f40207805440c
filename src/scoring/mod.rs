pub mod keywords;
pub mod remote;

use async_trait::async_trait;

use crate::profile::UserHealthProfile;

pub use keywords::{aggregate_score, base_score, personalized_score, HeuristicScorer};
pub use remote::{AnalyzeError, MealAnalysis, RemoteScorer};

/// Synchronous scoring contract. Implementations may additionally expose an
/// async refinement capability via [`Scorer::refiner`]; callers probe for it
/// instead of downcasting.
pub trait Scorer: Send + Sync {
    fn score(&self, description: &str, profile: Option<&UserHealthProfile>) -> f64;

    fn refiner(&self) -> Option<&dyn ScoreRefiner> {
        None
    }
}

/// Optional async refinement of a heuristic score, e.g. a remote model call.
/// Failures never propagate past the session; the heuristic result stands.
#[async_trait]
pub trait ScoreRefiner: Send + Sync {
    async fn analyze(&self, description: &str) -> Result<MealAnalysis, AnalyzeError>;
}

/// Heuristic scorer paired with an async refiner.
pub struct CompositeScorer<R> {
    heuristic: HeuristicScorer,
    refiner: R,
}

impl<R: ScoreRefiner> CompositeScorer<R> {
    pub fn new(heuristic: HeuristicScorer, refiner: R) -> Self {
        Self { heuristic, refiner }
    }
}

impl<R: ScoreRefiner> Scorer for CompositeScorer<R> {
    fn score(&self, description: &str, profile: Option<&UserHealthProfile>) -> f64 {
        self.heuristic.score(description, profile)
    }

    fn refiner(&self) -> Option<&dyn ScoreRefiner> {
        Some(&self.refiner)
    }
}
