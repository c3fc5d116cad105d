use crate::models::{AccessMode, AccessRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub content_type: String,
    #[validate(length(min = 1, message = "slug is required"))]
    pub slug: String,
    pub access_mode: AccessMode,
    pub description: Option<String>,
    /// Plaintext secret; hashed before storage. Required for shared-secret.
    pub secret: Option<String>,
    /// Initial allow-list. Only meaningful for allow-list rules.
    pub allowed_emails: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleRequest {
    pub access_mode: Option<AccessMode>,
    pub description: Option<String>,
    pub secret: Option<String>,
    pub allowed_emails: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleListQuery {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub mode: Option<String>,
}

/// Rule as returned to administrators. The secret hash never leaves the
/// service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub content_type: String,
    pub slug: String,
    pub access_mode: String,
    pub description: Option<String>,
    pub allowed_emails: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleResponse {
    pub fn from_rule(rule: AccessRule, allowed_emails: Vec<String>) -> Self {
        Self {
            id: rule.id,
            content_type: rule.content_type,
            slug: rule.slug,
            access_mode: rule.access_mode,
            description: rule.description,
            allowed_emails,
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}
