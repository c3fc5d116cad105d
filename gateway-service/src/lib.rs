pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::services::{AccessService, Database, Storage, SyncService};
use service_core::error::AppError;
use service_core::middleware::security_headers::security_headers_middleware;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub db: Database,
    pub access: AccessService,
    pub sync: Arc<SyncService>,
    pub public_storage: Arc<dyn Storage>,
    pub protected_storage: Arc<dyn Storage>,
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config)?;

    // The webhook authenticates itself by signature; everything else under
    // /api sits behind the internal API key.
    let internal = Router::new()
        .route(
            "/api/internal/access-rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route(
            "/api/internal/access-rules/:type/:slug",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .route(
            "/api/internal/access-rules/:type/:slug/emails",
            post(handlers::add_email),
        )
        .route(
            "/api/internal/access-rules/:type/:slug/emails/:email",
            delete(handlers::remove_email),
        )
        .route("/api/internal/logs", get(handlers::get_logs))
        .route("/api/internal/stats", get(handlers::get_stats))
        .route("/api/internal/build-logs", get(handlers::get_build_logs))
        .route("/api/internal/build-logs/:id", get(handlers::get_build_log))
        .route("/api/content-sync/manual", post(handlers::manual_sync))
        .route("/api/content-sync/status", get(handlers::sync_status))
        .route("/api/content-catalog", get(handlers::get_catalog))
        .route(
            "/api/content-catalog/:type",
            get(handlers::get_catalog_by_type),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::api_key_middleware,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/verify", post(handlers::verify))
        .route("/auth/access/:type/:slug", get(handlers::check_access))
        .route("/auth/content/:type/:slug", get(handlers::get_content))
        .route("/api/content-sync/webhook", post(handlers::webhook))
        .merge(internal)
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn cors_layer(config: &GatewayConfig) -> Result<CorsLayer, AppError> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

    if config.security.cors_origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any));
    }

    let origins = config
        .security
        .cors_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin {}: {}", origin, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]))
}
