//! Cloud mirror of archived snapshots.
//!
//! Documents live under `users/{user_id}/heatmap_snapshots/{yyyy-MM-dd}`; the
//! date string is the document id, so re-uploading a day overwrites rather
//! than duplicates. Uploads run sequentially and the first failure aborts the
//! rest — sync is the one operation whose errors reach the caller.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::archive::{day_key_string, DailySnapshot};

const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sign-in required before syncing")]
    AuthRequired,
    #[error("cloud sync not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[async_trait]
pub trait CloudSync: Send + Sync {
    async fn upload(&self, user_id: &str, snapshot: &DailySnapshot) -> Result<(), SyncError>;
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<DailySnapshot>, SyncError>;
}

#[derive(Clone)]
pub struct HttpCloudSync {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCloudSync {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let timeout = timeout.unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn collection_url(&self, user_id: &str) -> String {
        format!(
            "{}/users/{}/heatmap_snapshots",
            self.base_url.trim_end_matches('/'),
            user_id
        )
    }
}

#[async_trait]
impl CloudSync for HttpCloudSync {
    async fn upload(&self, user_id: &str, snapshot: &DailySnapshot) -> Result<(), SyncError> {
        let url = format!(
            "{}/{}",
            self.collection_url(user_id),
            day_key_string(snapshot.date)
        );
        let response = self.client.put(&url).json(snapshot).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::HttpStatus { status, body });
        }
        Ok(())
    }

    async fn fetch_all(&self, user_id: &str) -> Result<Vec<DailySnapshot>, SyncError> {
        let response = self
            .client
            .get(self.collection_url(user_id))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::HttpStatus { status, body });
        }
        Ok(response.json().await?)
    }
}
