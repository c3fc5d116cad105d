use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of credential presented with a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    None,
    Secret,
    Email,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::None => "none",
            CredentialType::Secret => "secret",
            CredentialType::Email => "email",
        }
    }
}

/// Append-only audit record for one verification attempt. Never mutated or
/// deleted by the application.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLog {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub content_type: String,
    pub slug: String,
    pub granted: bool,
    pub credential_type: String,
    pub credential_value: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AccessLog {
    pub fn new(
        rule_id: Option<Uuid>,
        content_type: &str,
        slug: &str,
        granted: bool,
        credential_type: CredentialType,
        credential_value: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id,
            content_type: content_type.to_string(),
            slug: slug.to_string(),
            granted,
            credential_type: credential_type.as_str().to_string(),
            credential_value,
            client_ip: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_client(mut self, client_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.client_ip = client_ip;
        self.user_agent = user_agent;
        self
    }
}
