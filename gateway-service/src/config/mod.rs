use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Source-of-truth document repository (GitHub).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub repo: String,
    pub branch: String,
    pub token: String,
    pub api_base: String,
    /// Repository prefix under which content lives.
    pub content_root: String,
    /// Per-document fetch timeout during a sync run.
    pub fetch_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: Option<String>,
    pub s3_region: Option<String>,
    pub public_bucket: String,
    pub protected_bucket: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// API key for administrative/internal calls.
    pub api_key: String,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// HS256 signing secret for access tokens.
    pub token_secret: String,
    pub token_ttl_minutes: i64,
    pub cors_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(GatewayConfig {
            common,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "Invalid DATABASE_MAX_CONNECTIONS: {}",
                            e
                        ))
                    })?,
            },
            source: SourceConfig {
                repo: get_env("SOURCE_REPO", None, is_prod)?,
                branch: get_env("SOURCE_BRANCH", Some("main"), is_prod)?,
                token: get_env("SOURCE_TOKEN", Some(""), is_prod)?,
                api_base: get_env("SOURCE_API_BASE", Some("https://api.github.com"), is_prod)?,
                content_root: get_env("SOURCE_CONTENT_ROOT", Some("content"), is_prod)?,
                fetch_timeout_seconds: get_env("SOURCE_FETCH_TIMEOUT_SECONDS", Some("30"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "Invalid SOURCE_FETCH_TIMEOUT_SECONDS: {}",
                            e
                        ))
                    })?,
            },
            storage: StorageConfig {
                backend: get_env("STORAGE_BACKEND", Some("local"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                local_path: env::var("STORAGE_LOCAL_PATH").ok(),
                s3_region: env::var("STORAGE_S3_REGION").ok(),
                public_bucket: get_env("STORAGE_PUBLIC_BUCKET", Some("content-public"), is_prod)?,
                protected_bucket: get_env(
                    "STORAGE_PROTECTED_BUCKET",
                    Some("content-protected"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                api_key: get_env("API_KEY", Some("dev-api-key"), is_prod)?,
                webhook_secret: get_env("WEBHOOK_SECRET", Some("dev-webhook-secret"), is_prod)?,
                token_secret: get_env("TOKEN_SECRET", Some("dev-token-secret"), is_prod)?,
                token_ttl_minutes: get_env("TOKEN_TTL_MINUTES", Some("60"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("Invalid TOKEN_TTL_MINUTES: {}", e))
                    })?,
                cors_origins: get_env("CORS_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        })
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
