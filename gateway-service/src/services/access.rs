//! Credential verification, token issuance, and access auditing.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use service_core::error::AppError;

use crate::models::{
    normalize_email, AccessLog, AccessMode, AccessRule, CredentialType, DocumentArtifact,
    Visibility,
};
use crate::services::storage::Storage;
use crate::services::token::TokenService;
use crate::services::Database;

/// Request metadata captured into the audit log.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Outcome of checking a submitted credential against one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialCheck {
    Granted {
        credential_type: CredentialType,
        credential_value: Option<String>,
        email: Option<String>,
    },
    /// The required credential was not submitted at all.
    MissingCredential {
        credential_type: CredentialType,
        message: &'static str,
    },
    Denied {
        credential_type: CredentialType,
        credential_value: Option<String>,
    },
}

/// One-way hash applied to shared secrets before storage and comparison.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn secret_matches(stored_hash: &str, submitted: &str) -> bool {
    let submitted_hash = hash_secret(submitted);
    let a = stored_hash.as_bytes();
    let b = submitted_hash.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Pure credential check for one access mode. Plaintext secrets are never
/// compared; only hashes, in constant time.
pub fn check_credential(
    mode: AccessMode,
    secret_hash: Option<&str>,
    allowlist: &[String],
    secret: Option<&str>,
    email: Option<&str>,
) -> CredentialCheck {
    match mode {
        AccessMode::Open => CredentialCheck::Granted {
            credential_type: CredentialType::None,
            credential_value: None,
            email: None,
        },
        AccessMode::SharedSecret => {
            let Some(submitted) = secret.filter(|s| !s.is_empty()) else {
                return CredentialCheck::MissingCredential {
                    credential_type: CredentialType::Secret,
                    message: "A secret is required for this content",
                };
            };
            match secret_hash {
                Some(stored) if secret_matches(stored, submitted) => CredentialCheck::Granted {
                    credential_type: CredentialType::Secret,
                    credential_value: None,
                    email: None,
                },
                // A shared-secret rule without a stored hash denies too;
                // there is nothing a correct secret could match.
                _ => CredentialCheck::Denied {
                    credential_type: CredentialType::Secret,
                    credential_value: None,
                },
            }
        }
        AccessMode::AllowList => {
            let Some(submitted) = email.map(str::trim).filter(|e| !e.is_empty()) else {
                return CredentialCheck::MissingCredential {
                    credential_type: CredentialType::Email,
                    message: "An email is required for this content",
                };
            };
            let normalized = normalize_email(submitted);
            if allowlist.iter().any(|e| e == &normalized) {
                CredentialCheck::Granted {
                    credential_type: CredentialType::Email,
                    credential_value: Some(normalized.clone()),
                    email: Some(normalized),
                }
            } else {
                CredentialCheck::Denied {
                    credential_type: CredentialType::Email,
                    credential_value: Some(normalized),
                }
            }
        }
    }
}

/// Public entry point for "may this caller see this document" and "give me
/// the document".
#[derive(Clone)]
pub struct AccessService {
    db: Database,
    token: TokenService,
    public_storage: Arc<dyn Storage>,
    protected_storage: Arc<dyn Storage>,
}

impl AccessService {
    pub fn new(
        db: Database,
        token: TokenService,
        public_storage: Arc<dyn Storage>,
        protected_storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            db,
            token,
            public_storage,
            protected_storage,
        }
    }

    /// Look up the rule for one document. A missing rule is a distinct
    /// outcome from open access.
    pub async fn resolve_policy(
        &self,
        content_type: &str,
        slug: &str,
    ) -> Result<Option<AccessRule>, AppError> {
        self.db.find_rule(content_type, slug).await
    }

    /// Verify a credential and mint a token on grant.
    ///
    /// Every path through here, grant or deny, writes exactly one audit row.
    /// Denials carry a generic message so callers cannot tell which check
    /// failed.
    pub async fn verify(
        &self,
        content_type: &str,
        slug: &str,
        secret: Option<&str>,
        email: Option<&str>,
        client: &ClientContext,
    ) -> Result<(String, AccessMode), AppError> {
        let Some(rule) = self.db.find_rule(content_type, slug).await? else {
            self.log_attempt(AccessLog::new(
                None,
                content_type,
                slug,
                false,
                CredentialType::None,
                None,
            ), client)
            .await;
            return Err(AppError::NotFound(anyhow::anyhow!("Content not found")));
        };

        let mode = match rule.mode() {
            Ok(mode) => mode,
            Err(e) => {
                // A rule with an unsupported mode is a configuration error,
                // never treated as open.
                tracing::error!(
                    content_type = %content_type,
                    slug = %slug,
                    mode = %rule.access_mode,
                    "Access rule has unsupported mode"
                );
                self.log_attempt(AccessLog::new(
                    Some(rule.id),
                    content_type,
                    slug,
                    false,
                    CredentialType::None,
                    None,
                ), client)
                .await;
                return Err(e);
            }
        };

        let allowlist = if mode == AccessMode::AllowList {
            self.db.list_allowlist(rule.id).await?
        } else {
            Vec::new()
        };

        let check = check_credential(mode, rule.secret_hash.as_deref(), &allowlist, secret, email);

        match check {
            CredentialCheck::Granted {
                credential_type,
                credential_value,
                email,
            } => {
                self.log_attempt(AccessLog::new(
                    Some(rule.id),
                    content_type,
                    slug,
                    true,
                    credential_type,
                    credential_value,
                ), client)
                .await;
                let token = self.token.issue(content_type, slug, email)?;
                Ok((token, mode))
            }
            CredentialCheck::MissingCredential {
                credential_type,
                message,
            } => {
                self.log_attempt(AccessLog::new(
                    Some(rule.id),
                    content_type,
                    slug,
                    false,
                    credential_type,
                    None,
                ), client)
                .await;
                Err(AppError::BadRequest(anyhow::anyhow!(message)))
            }
            CredentialCheck::Denied {
                credential_type,
                credential_value,
            } => {
                self.log_attempt(AccessLog::new(
                    Some(rule.id),
                    content_type,
                    slug,
                    false,
                    credential_type,
                    credential_value,
                ), client)
                .await;
                Err(AppError::Unauthorized(anyhow::anyhow!(
                    "Invalid credential"
                )))
            }
        }
    }

    /// Return the synchronized artifact for a document, gated by a token
    /// scoped to it.
    pub async fn fetch_protected_document(
        &self,
        content_type: &str,
        slug: &str,
        token: &str,
    ) -> Result<DocumentArtifact, AppError> {
        self.token.validate(token, content_type, slug)?;

        let rule = self.db.find_rule(content_type, slug).await?;
        let mode = rule.map(|r| r.mode()).transpose()?;
        let (visibility, _) = Visibility::resolve(mode);

        let storage = match visibility {
            Visibility::Public => &self.public_storage,
            Visibility::Protected => &self.protected_storage,
        };

        let key = format!("{}/{}.json", content_type, slug);
        let bytes = storage.download(&key).await.map_err(|_| {
            AppError::NotFound(anyhow::anyhow!("Content not found: {}/{}", content_type, slug))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Stored artifact is not valid JSON: {}", e))
        })
    }

    /// Best-effort audit append. A failed write is surfaced in the logs but
    /// never fails the parent request.
    async fn log_attempt(&self, log: AccessLog, client: &ClientContext) {
        let log = log.with_client(client.ip.clone(), client.user_agent.clone());
        if let Err(e) = self.db.insert_access_log(&log).await {
            tracing::error!(
                content_type = %log.content_type,
                slug = %log.slug,
                granted = log.granted,
                "Failed to write access log: {}",
                e
            );
        }
    }
}
