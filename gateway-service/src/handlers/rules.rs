//! Administrative CRUD over access rules and their allow-lists.
//! Everything here sits behind the internal API key.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    CreateRuleRequest, EmailRequest, RuleListQuery, RuleResponse, UpdateRuleRequest,
};
use crate::models::{AccessMode, AccessRule};
use crate::services::access::hash_secret;
use crate::AppState;
use service_core::error::AppError;

/// GET /api/internal/access-rules
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<RuleListQuery>,
) -> Result<Json<Vec<RuleResponse>>, AppError> {
    // Reject a bad mode filter up front rather than matching nothing.
    let mode_filter = match query.mode.as_deref() {
        Some(mode) => Some(
            AccessMode::parse(mode)
                .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid mode filter: {}", mode)))?,
        ),
        None => None,
    };

    let rules = state
        .db
        .list_rules(
            query.content_type.as_deref(),
            mode_filter.map(|m| m.as_str()),
        )
        .await?;

    let mut responses = Vec::with_capacity(rules.len());
    for rule in rules {
        let emails = state.db.list_allowlist(rule.id).await?;
        responses.push(RuleResponse::from_rule(rule, emails));
    }
    Ok(Json(responses))
}

/// POST /api/internal/access-rules
pub async fn create_rule(
    State(state): State<AppState>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), AppError> {
    req.validate()?;

    let secret_hash = match req.access_mode {
        AccessMode::SharedSecret => {
            let secret = req
                .secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "A secret is required for shared-secret rules"
                    ))
                })?;
            Some(hash_secret(secret))
        }
        _ => None,
    };

    let allowed_emails = match req.access_mode {
        AccessMode::AllowList => req.allowed_emails.unwrap_or_default(),
        _ => Vec::new(),
    };

    let now = Utc::now();
    let rule = AccessRule {
        id: Uuid::new_v4(),
        content_type: req.content_type,
        slug: req.slug,
        access_mode: req.access_mode.as_str().to_string(),
        description: req.description,
        secret_hash,
        created_at: now,
        updated_at: now,
    };

    state.db.insert_rule(&rule, &allowed_emails).await?;
    let emails = state.db.list_allowlist(rule.id).await?;

    tracing::info!(
        content_type = %rule.content_type,
        slug = %rule.slug,
        mode = %rule.access_mode,
        "Access rule created"
    );
    Ok((StatusCode::CREATED, Json(RuleResponse::from_rule(rule, emails))))
}

/// GET /api/internal/access-rules/{type}/{slug}
pub async fn get_rule(
    State(state): State<AppState>,
    Path((content_type, slug)): Path<(String, String)>,
) -> Result<Json<RuleResponse>, AppError> {
    let (rule, emails) = state
        .db
        .rule_with_allowlist(&content_type, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Access rule not found")))?;
    Ok(Json(RuleResponse::from_rule(rule, emails)))
}

/// PUT /api/internal/access-rules/{type}/{slug}
pub async fn update_rule(
    State(state): State<AppState>,
    Path((content_type, slug)): Path<(String, String)>,
    Json(req): Json<UpdateRuleRequest>,
) -> Result<Json<RuleResponse>, AppError> {
    let existing = state
        .db
        .find_rule(&content_type, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Access rule not found")))?;

    let effective_mode = match req.access_mode {
        Some(mode) => mode,
        None => existing.mode()?,
    };

    let secret_hash = match req.secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => Some(hash_secret(secret)),
        None => None,
    };

    // A shared-secret rule must always have a hash to check against.
    if effective_mode == AccessMode::SharedSecret
        && secret_hash.is_none()
        && existing.secret_hash.is_none()
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "A secret is required for shared-secret rules"
        )));
    }

    let updated = state
        .db
        .update_rule(
            &content_type,
            &slug,
            req.access_mode.map(|m| m.as_str()),
            req.description.as_deref(),
            secret_hash.as_deref(),
            req.allowed_emails.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Access rule not found")))?;

    let emails = state.db.list_allowlist(updated.id).await?;
    tracing::info!(
        content_type = %content_type,
        slug = %slug,
        mode = %updated.access_mode,
        "Access rule updated"
    );
    Ok(Json(RuleResponse::from_rule(updated, emails)))
}

/// DELETE /api/internal/access-rules/{type}/{slug}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path((content_type, slug)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let removed = state.db.delete_rule(&content_type, &slug).await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Access rule not found")));
    }
    tracing::info!(content_type = %content_type, slug = %slug, "Access rule deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/internal/access-rules/{type}/{slug}/emails
pub async fn add_email(
    State(state): State<AppState>,
    Path((content_type, slug)): Path<(String, String)>,
    Json(req): Json<EmailRequest>,
) -> Result<(StatusCode, Json<Vec<String>>), AppError> {
    req.validate()?;

    let rule = state
        .db
        .find_rule(&content_type, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Access rule not found")))?;

    if rule.mode()? != AccessMode::AllowList {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Rule is not allow-list; emails do not apply"
        )));
    }

    state.db.add_allowlist_email(rule.id, &req.email).await?;
    let emails = state.db.list_allowlist(rule.id).await?;
    Ok((StatusCode::CREATED, Json(emails)))
}

/// DELETE /api/internal/access-rules/{type}/{slug}/emails/{email}
pub async fn remove_email(
    State(state): State<AppState>,
    Path((content_type, slug, email)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let rule = state
        .db
        .find_rule(&content_type, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Access rule not found")))?;

    let removed = state.db.remove_allowlist_email(rule.id, &email).await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Email is not on the allow-list"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
