use crate::models::{AccessLog, BuildLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub failed: Option<bool>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub logs: Vec<AccessLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: i64,
    pub granted: i64,
    pub denied: i64,
    pub by_credential_type: BTreeMap<String, i64>,
    pub by_document: Vec<DocumentStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    #[serde(rename = "type")]
    pub content_type: String,
    pub slug: String,
    pub total: i64,
    pub denied: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildLogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLogsResponse {
    pub builds: Vec<BuildLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
