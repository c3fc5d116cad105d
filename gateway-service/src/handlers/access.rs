//! Public access surface: credential disclosure, verification, and gated
//! content delivery.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dtos::{AccessCheckResponse, VerifyDenial, VerifyRequest, VerifyResponse};
use crate::models::DocumentArtifact;
use crate::services::ClientContext;
use crate::AppState;
use service_core::error::AppError;

/// GET /auth/access/{type}/{slug}
///
/// Discloses which credential a document wants. This is the one intentional
/// disclosure point; a document without a rule reads as open.
pub async fn check_access(
    State(state): State<AppState>,
    Path((content_type, slug)): Path<(String, String)>,
) -> Result<Json<AccessCheckResponse>, AppError> {
    let mode = match state.access.resolve_policy(&content_type, &slug).await? {
        Some(rule) => rule.mode()?,
        None => {
            // No rule means the document is public if it exists at all.
            let key = format!("{}/{}.json", content_type, slug);
            if state.public_storage.download(&key).await.is_err() {
                return Err(AppError::NotFound(anyhow::anyhow!("Content not found")));
            }
            crate::models::AccessMode::Open
        }
    };

    Ok(Json(AccessCheckResponse::for_mode(mode)))
}

/// POST /auth/verify
///
/// Grants and denials both answer with a `success`-keyed body; this endpoint
/// never uses the generic error envelope.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return denial(StatusCode::BAD_REQUEST, &e.to_string());
    }

    let client = client_context(&headers);
    match state
        .access
        .verify(
            &req.content_type,
            &req.slug,
            req.secret.as_deref(),
            req.email.as_deref(),
            &client,
        )
        .await
    {
        Ok((token, access_mode)) => Json(VerifyResponse {
            success: true,
            token: Some(token),
            access_mode,
        })
        .into_response(),
        Err(e) => denial_for(e),
    }
}

fn denial_for(err: AppError) -> Response {
    let (status, message) = match err {
        AppError::ValidationError(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.to_string()),
        AppError::Unauthorized(e) | AppError::Forbidden(e) => {
            (StatusCode::UNAUTHORIZED, e.to_string())
        }
        // Internal failures stay generic; their detail goes to the logs.
        other => {
            tracing::error!("Verification failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    denial(status, &message)
}

fn denial(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(VerifyDenial {
            success: false,
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// GET /auth/content/{type}/{slug}
///
/// Requires a bearer token scoped to exactly this document.
pub async fn get_content(
    State(state): State<AppState>,
    Path((content_type, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<DocumentArtifact>, AppError> {
    let token = bearer_token(&headers)?;
    let artifact = state
        .access
        .fetch_protected_document(&content_type, &slug, token)
        .await?;
    Ok(Json(artifact))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")))
}

pub(crate) fn client_context(headers: &HeaderMap) -> ClientContext {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string());
    let user_agent = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    ClientContext { ip, user_agent }
}
