pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod password;
pub mod pricing;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod token;

use std::{path::Path, sync::Arc};

use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    routing::get,
};
use tower_http::services::ServeDir;

use crate::{
    config::{AppConfig, RevocationBackend},
    db::{DbPool, orm_from_pool},
    response::{ApiResponse, Meta},
    routes::{create_api_router, doc::scalar_docs, health},
    state::AppState,
    storage::{
        objects::LocalObjectStore,
        revocation::{MemoryRevocationStore, PgRevocationStore, RevocationStore},
    },
    token::TokenService,
};

impl AppState {
    /// Wire collaborators from configuration around an existing pool.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Self {
        let orm = orm_from_pool(&pool);
        let revocations: Arc<dyn RevocationStore> = match config.revocation_backend {
            RevocationBackend::Postgres => Arc::new(PgRevocationStore::new(orm.clone())),
            RevocationBackend::Memory => Arc::new(MemoryRevocationStore::default()),
        };

        AppState {
            pool,
            orm,
            tokens: TokenService::new(&config.jwt_secret, config.jwt_ttl_secs),
            revocations,
            objects: Arc::new(LocalObjectStore::new(
                &config.upload_dir,
                &config.public_base_url,
            )),
        }
    }
}

/// Routes without the outer tower layers; those are added by the binary.
pub fn app_router(state: AppState, upload_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .nest_service("/uploads", ServeDir::new(upload_dir.as_ref()))
        .merge(scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let body = ApiResponse::success(
        "Not Found",
        serde_json::json!({ "path": uri.path() }),
        Some(Meta::empty()),
    );
    (StatusCode::NOT_FOUND, Json(body))
}
