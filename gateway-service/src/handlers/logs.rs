//! Read-only views over the access and build audit logs.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dtos::{
    BuildLogsQuery, BuildLogsResponse, DocumentStats, LogsQuery, LogsResponse, StatsQuery,
    StatsResponse,
};
use crate::models::BuildLog;
use crate::services::database::clamp_page;
use crate::AppState;
use service_core::error::AppError;

/// GET /api/internal/logs
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, AppError> {
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let (logs, total) = state
        .db
        .find_access_logs(
            query.failed.unwrap_or(false),
            query.content_type.as_deref(),
            query.slug.as_deref(),
            query.limit,
            query.offset,
        )
        .await?;

    Ok(Json(LogsResponse {
        logs,
        total,
        limit,
        offset,
    }))
}

/// GET /api/internal/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.db.access_stats(query.start, query.end).await?;

    let by_credential_type: BTreeMap<String, i64> =
        stats.by_credential_type.into_iter().collect();
    let by_document = stats
        .by_document
        .into_iter()
        .map(|(content_type, slug, total, denied)| DocumentStats {
            content_type,
            slug,
            total,
            denied,
        })
        .collect();

    Ok(Json(StatsResponse {
        total: stats.total,
        granted: stats.granted,
        denied: stats.denied,
        by_credential_type,
        by_document,
    }))
}

/// GET /api/internal/build-logs
pub async fn get_build_logs(
    State(state): State<AppState>,
    Query(query): Query<BuildLogsQuery>,
) -> Result<Json<BuildLogsResponse>, AppError> {
    if let Some(status) = query.status.as_deref() {
        if !matches!(status, "running" | "success" | "failed") {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid status filter: {}",
                status
            )));
        }
    }
    if let Some(kind) = query.kind.as_deref() {
        if !matches!(kind, "content" | "full") {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid type filter: {}",
                kind
            )));
        }
    }

    let (limit, offset) = clamp_page(query.limit, query.offset);
    let (builds, total) = state
        .db
        .find_build_logs(
            query.status.as_deref(),
            query.kind.as_deref(),
            query.limit,
            query.offset,
        )
        .await?;

    Ok(Json(BuildLogsResponse {
        builds,
        total,
        limit,
        offset,
    }))
}

/// GET /api/internal/build-logs/{id}
pub async fn get_build_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BuildLog>, AppError> {
    let build = state
        .db
        .find_build_log_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Build log not found")))?;
    Ok(Json(build))
}
