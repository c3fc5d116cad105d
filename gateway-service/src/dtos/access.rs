use crate::models::AccessMode;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /auth/verify`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub content_type: String,
    #[validate(length(min = 1, message = "slug is required"))]
    pub slug: String,
    pub secret: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub access_mode: AccessMode,
}

/// Failed `POST /auth/verify` body. Denials speak the same `success`-keyed
/// shape as grants so clients branch on one field.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyDenial {
    pub success: bool,
    pub message: String,
}

/// Response of `GET /auth/access/{type}/{slug}`. This endpoint is the
/// intentional disclosure point for which credential a document wants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckResponse {
    pub access_mode: AccessMode,
    pub requires_secret: bool,
    pub requires_email: bool,
    pub message: String,
}

impl AccessCheckResponse {
    pub fn for_mode(mode: AccessMode) -> Self {
        let (requires_secret, requires_email, message) = match mode {
            AccessMode::Open => (false, false, "This content is open".to_string()),
            AccessMode::SharedSecret => {
                (true, false, "This content requires a secret".to_string())
            }
            AccessMode::AllowList => (
                false,
                true,
                "This content requires an approved email".to_string(),
            ),
        };
        Self {
            access_mode: mode,
            requires_secret,
            requires_email,
            message,
        }
    }
}
