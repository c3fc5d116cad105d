use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::Client as S3Client;
use tokio::net::TcpListener;

use crate::config::{GatewayConfig, StorageBackend};
use crate::services::{
    AccessService, Database, GithubFetcher, LocalStorage, S3Storage, Storage, SyncService,
    TokenService,
};
use crate::{build_router, AppState};
use service_core::error::AppError;

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let db = Database::connect(&config.database.url, config.database.max_connections)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to PostgreSQL: {}", e);
                e
            })?;
        db.run_migrations().await?;

        let (public_storage, protected_storage) = build_storage(&config).await?;

        let fetcher = Arc::new(GithubFetcher::new(&config.source)?);
        let token = TokenService::new(
            &config.security.token_secret,
            config.security.token_ttl_minutes,
        );

        let access = AccessService::new(
            db.clone(),
            token,
            public_storage.clone(),
            protected_storage.clone(),
        );
        let sync = Arc::new(SyncService::new(
            db.clone(),
            fetcher,
            public_storage.clone(),
            protected_storage.clone(),
            config.source.content_root.clone(),
            Duration::from_secs(config.source.fetch_timeout_seconds),
        ));

        let state = AppState {
            config: config.clone(),
            db,
            access,
            sync,
            public_storage,
            protected_storage,
        };

        let app = build_router(state.clone())?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn build_storage(
    config: &GatewayConfig,
) -> Result<(Arc<dyn Storage>, Arc<dyn Storage>), AppError> {
    match config.storage.backend {
        StorageBackend::Local => {
            let base = PathBuf::from(
                config
                    .storage
                    .local_path
                    .clone()
                    .unwrap_or_else(|| "./storage".to_string()),
            );
            let public = LocalStorage::new(
                base.join(&config.storage.public_bucket),
                &config.storage.public_bucket,
            )
            .await?;
            let protected = LocalStorage::new(
                base.join(&config.storage.protected_bucket),
                &config.storage.protected_bucket,
            )
            .await?;
            Ok((Arc::new(public), Arc::new(protected)))
        }
        StorageBackend::S3 => {
            let region = config.storage.s3_region.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "STORAGE_S3_REGION is required for the s3 backend"
                ))
            })?;
            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(region))
                .load()
                .await;
            let client = S3Client::new(&aws_config);

            let public = S3Storage::new(client.clone(), config.storage.public_bucket.clone());
            let protected = S3Storage::new(client, config.storage.protected_bucket.clone());
            Ok((Arc::new(public), Arc::new(protected)))
        }
    }
}
