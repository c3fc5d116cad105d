use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

/// How access to a document is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    Open,
    SharedSecret,
    AllowList,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Open => "open",
            AccessMode::SharedSecret => "shared-secret",
            AccessMode::AllowList => "allow-list",
        }
    }

    /// Parse a stored mode code. An unknown code is a configuration error,
    /// never silently treated as open.
    pub fn parse(code: &str) -> Result<Self, AppError> {
        match code {
            "open" => Ok(AccessMode::Open),
            "shared-secret" => Ok(AccessMode::SharedSecret),
            "allow-list" => Ok(AccessMode::AllowList),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unsupported access mode: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public/protected classification of a document in object storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
}

impl Visibility {
    /// Resolve visibility from an optional access rule mode.
    ///
    /// Returns the classification and whether it came from the missing-rule
    /// default. A document without a rule is public; callers must log that
    /// fallback so it is never silent.
    pub fn resolve(mode: Option<AccessMode>) -> (Visibility, bool) {
        match mode {
            Some(AccessMode::Open) => (Visibility::Public, false),
            Some(AccessMode::SharedSecret) | Some(AccessMode::AllowList) => {
                (Visibility::Protected, false)
            }
            None => (Visibility::Public, true),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
        }
    }
}

/// One access rule per (content_type, slug). Single source of truth for
/// document visibility.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessRule {
    pub id: Uuid,
    pub content_type: String,
    pub slug: String,
    pub access_mode: String,
    pub description: Option<String>,
    /// SHA-256 hex digest; present iff access_mode is shared-secret.
    pub secret_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRule {
    pub fn mode(&self) -> Result<AccessMode, AppError> {
        AccessMode::parse(&self.access_mode)
    }
}

/// Allow-listed email for an allow-list rule. Rows live only while the
/// owning rule has access_mode = allow-list.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllowlistEntry {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub email: String,
    pub added_at: DateTime<Utc>,
}

/// Case-normalization applied to every email before storage or comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_modes() {
        assert_eq!(AccessMode::parse("open").unwrap(), AccessMode::Open);
        assert_eq!(
            AccessMode::parse("shared-secret").unwrap(),
            AccessMode::SharedSecret
        );
        assert_eq!(
            AccessMode::parse("allow-list").unwrap(),
            AccessMode::AllowList
        );
    }

    #[test]
    fn unknown_mode_is_config_error() {
        let err = AccessMode::parse("password").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn visibility_resolution() {
        assert_eq!(
            Visibility::resolve(Some(AccessMode::Open)),
            (Visibility::Public, false)
        );
        assert_eq!(
            Visibility::resolve(Some(AccessMode::SharedSecret)),
            (Visibility::Protected, false)
        );
        assert_eq!(
            Visibility::resolve(Some(AccessMode::AllowList)),
            (Visibility::Protected, false)
        );
        // Missing rule defaults to public, flagged so callers can warn.
        assert_eq!(Visibility::resolve(None), (Visibility::Public, true));
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
