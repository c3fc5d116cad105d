use axum::{extract::State, response::Json};
use serde_json::json;

use crate::AppState;
use service_core::error::AppError;

/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await?;

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.common.service_name,
    })))
}
