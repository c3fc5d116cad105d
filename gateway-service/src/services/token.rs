use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// Claims for a document access token. Scoped to exactly one document and
/// time-bounded; validated server-side on every protected fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Document type the verification was for
    #[serde(rename = "type")]
    pub content_type: String,
    /// Document slug the verification was for
    pub slug: String,
    /// Verified email, for allow-list grants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and validates HMAC-signed access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    /// Mint a signed token asserting a successful verification for one
    /// document.
    pub fn issue(
        &self,
        content_type: &str,
        slug: &str,
        email: Option<String>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            content_type: content_type.to_string(),
            slug: slug.to_string(),
            email,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Validate signature and expiry, then check that the claims are scoped
    /// to the requested document.
    pub fn validate(
        &self,
        token: &str,
        content_type: &str,
        slug: &str,
    ) -> Result<AccessTokenClaims, AppError> {
        let data = decode::<AccessTokenClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

        let claims = data.claims;
        if claims.content_type != content_type || claims.slug != slug {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Token is not valid for this content"
            )));
        }

        Ok(claims)
    }
}
