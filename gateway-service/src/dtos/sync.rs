use crate::models::BuildLog;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/content-sync/manual`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSyncRequest {
    pub full_sync: Option<bool>,
    pub files: Option<Vec<String>>,
}

/// Per-document failure inside a sync run. Collected, never thrown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorEntry {
    pub path: String,
    pub message: String,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub build_id: Uuid,
    pub files_processed: usize,
    pub public_count: usize,
    pub protected_count: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub errors: Vec<SyncErrorEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub message: String,
    pub files_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub status: String,
    pub buckets: SyncBuckets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_build: Option<BuildLog>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBuckets {
    pub public: String,
    pub protected: String,
}
