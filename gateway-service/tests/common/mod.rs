//! Shared setup for gateway integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use gateway_service::config::{
    DatabaseConfig, GatewayConfig, SecurityConfig, SourceConfig, StorageBackend, StorageConfig,
};
use gateway_service::services::{
    AccessService, Database, LocalStorage, SourceFetcher, Storage, SyncService, TokenService,
};
use gateway_service::{build_router, AppState};
use service_core::error::AppError;

pub const API_KEY: &str = "test-api-key";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const TOKEN_SECRET: &str = "test-token-secret";

/// Source fetcher serving an in-memory file set.
pub struct StubFetcher {
    files: HashMap<String, String>,
}

impl StubFetcher {
    pub fn empty() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    pub fn with_files(files: Vec<(String, String)>) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch_file(&self, path: &str) -> Result<String, AppError> {
        self.files.get(path).cloned().ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Source file not found: {}", path))
        })
    }

    async fn list_content_paths(&self) -> Result<Vec<String>, AppError> {
        let mut paths: Vec<String> = self.files.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

pub struct TestApp {
    pub state: AppState,
    _dirs: (TempDir, TempDir),
}

impl TestApp {
    /// App over a lazy pool. Only for request paths that are answered before
    /// any database query would be issued.
    pub async fn detached() -> Self {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        Self::build(pool, StubFetcher::empty()).await
    }

    /// App over a live test database, following the TEST_DATABASE_URL
    /// convention. Returns None when the variable is unset so callers can
    /// skip their scenario.
    pub async fn with_database(fetcher: StubFetcher) -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("Failed to connect to TEST_DATABASE_URL");

        let app = Self::build(pool, fetcher).await;
        app.state
            .db
            .run_migrations()
            .await
            .expect("Failed to run migrations");
        Some(app)
    }

    async fn build(pool: PgPool, fetcher: StubFetcher) -> Self {
        let public_dir = tempfile::tempdir().unwrap();
        let protected_dir = tempfile::tempdir().unwrap();

        let public_storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(public_dir.path(), "content-public")
                .await
                .unwrap(),
        );
        let protected_storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(protected_dir.path(), "content-protected")
                .await
                .unwrap(),
        );

        let db = Database::new(pool);
        let token = TokenService::new(TOKEN_SECRET, 60);
        let access = AccessService::new(
            db.clone(),
            token,
            public_storage.clone(),
            protected_storage.clone(),
        );
        let sync = Arc::new(SyncService::new(
            db.clone(),
            Arc::new(fetcher),
            public_storage.clone(),
            protected_storage.clone(),
            "content".to_string(),
            Duration::from_secs(5),
        ));

        let state = AppState {
            config: test_config(),
            db,
            access,
            sync,
            public_storage,
            protected_storage,
        };

        Self {
            state,
            _dirs: (public_dir, protected_dir),
        }
    }

    pub async fn request(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let router = build_router(self.state.clone()).unwrap();
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        common: service_core::config::Config {
            port: 0,
            service_name: "gateway-service".to_string(),
            log_level: "error".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/unreachable".to_string(),
            max_connections: 1,
        },
        source: SourceConfig {
            repo: "example/content".to_string(),
            branch: "main".to_string(),
            token: String::new(),
            api_base: "https://api.github.com".to_string(),
            content_root: "content".to_string(),
            fetch_timeout_seconds: 5,
        },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            local_path: None,
            s3_region: None,
            public_bucket: "content-public".to_string(),
            protected_bucket: "content-protected".to_string(),
        },
        security: SecurityConfig {
            api_key: API_KEY.to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            token_secret: TOKEN_SECRET.to_string(),
            token_ttl_minutes: 60,
            cors_origins: vec!["*".to_string()],
        },
    }
}

/// Slug unique per test run, so scenarios sharing one database never collide.
pub fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}
