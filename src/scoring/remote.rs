//! Remote model-backed scorer. Implements the same description -> score
//! contract as the keyword heuristic, plus mood and sound hints for the
//! presentation layer. Callers treat any failure as "keep the heuristic
//! score"; there is no retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::ScoreRefiner;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_score() -> f64 {
    0.5
}

fn default_mood() -> String {
    "neutral".to_string()
}

fn default_sound() -> String {
    "tink".to_string()
}

/// Wire response. Unknown or missing fields fall back to neutral defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealAnalysis {
    #[serde(rename = "healthScore", default = "default_score")]
    pub health_score: f64,
    #[serde(default = "default_mood")]
    pub mood: String,
    #[serde(default = "default_sound")]
    pub sound: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    description: &'a str,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("scorer not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Clone)]
pub struct RemoteScorer {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteScorer {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        let timeout = timeout.unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl ScoreRefiner for RemoteScorer {
    async fn analyze(&self, description: &str) -> Result<MealAnalysis, AnalyzeError> {
        if self.endpoint.trim().is_empty() {
            return Err(AnalyzeError::NotConfigured);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { description })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzeError::HttpStatus { status, body });
        }

        let mut analysis: MealAnalysis = response.json().await?;
        analysis.health_score = analysis.health_score.clamp(0.0, 1.0);
        Ok(analysis)
    }
}
