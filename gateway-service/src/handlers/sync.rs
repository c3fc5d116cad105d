//! Sync control surface: source webhook, manual trigger, and status.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};

use crate::dtos::{ManualSyncRequest, SyncBuckets, SyncStatusResponse, WebhookResponse};
use crate::models::{BuildKind, BuildTrigger};
use crate::services::source::{
    select_changed_paths, select_removed_paths, NormalizedPush, PushEventPayload,
};
use crate::AppState;
use service_core::error::AppError;
use service_core::utils::signature::verify_signature;

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// POST /api/content-sync/webhook
///
/// The signature is checked over the raw body before any parsing; an
/// unsigned or mis-signed payload never reaches the JSON decoder.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing signature header")))?;

    let valid = verify_signature(&state.config.security.webhook_secret, &body, signature)
        .map_err(AppError::InternalError)?;
    if !valid {
        tracing::warn!("Webhook signature verification failed");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let payload: PushEventPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))?;
    let event = NormalizedPush::from_payload(&payload);

    if event.branch != state.config.source.branch {
        tracing::info!(branch = %event.branch, "Ignoring push to non-content branch");
        return Ok(Json(WebhookResponse {
            message: format!("Ignoring push to branch {}", event.branch),
            files_processed: 0,
            result: None,
        }));
    }

    let changed = select_changed_paths(&event, &state.config.source.content_root);
    let removed = select_removed_paths(&event, &state.config.source.content_root);
    if changed.is_empty() && removed.is_empty() {
        tracing::info!("Push contains no content changes");
        return Ok(Json(WebhookResponse {
            message: "No content changes in push".to_string(),
            files_processed: 0,
            result: None,
        }));
    }

    let report = state
        .sync
        .run(
            changed,
            removed,
            BuildKind::Content,
            BuildTrigger::Automated,
            event.revision.clone(),
            Some(event.branch.clone()),
        )
        .await?;

    Ok(Json(WebhookResponse {
        message: "Sync completed".to_string(),
        files_processed: report.files_processed,
        result: Some(report),
    }))
}

/// POST /api/content-sync/manual
pub async fn manual_sync(
    State(state): State<AppState>,
    Json(req): Json<ManualSyncRequest>,
) -> Result<Json<crate::dtos::SyncReport>, AppError> {
    if req.full_sync.unwrap_or(false) {
        let report = state.sync.run_full(BuildTrigger::Manual, None, None).await?;
        return Ok(Json(report));
    }

    match req.files {
        Some(files) if !files.is_empty() => {
            let report = state
                .sync
                .run(
                    files,
                    Vec::new(),
                    BuildKind::Content,
                    BuildTrigger::Manual,
                    None,
                    None,
                )
                .await?;
            Ok(Json(report))
        }
        _ => Err(AppError::BadRequest(anyhow::anyhow!(
            "Either fullSync or a non-empty files list is required"
        ))),
    }
}

/// GET /api/content-sync/status
pub async fn sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, AppError> {
    let last_build = state.db.latest_build_log().await?;
    let status = last_build
        .as_ref()
        .map(|b| b.status.clone())
        .unwrap_or_else(|| "idle".to_string());

    Ok(Json(SyncStatusResponse {
        status,
        buckets: SyncBuckets {
            public: state.public_storage.bucket().to_string(),
            protected: state.protected_storage.bucket().to_string(),
        },
        last_build,
    }))
}
