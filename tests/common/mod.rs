#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use sea_orm::ActiveModelTrait;
use sea_orm::ActiveValue::{NotSet, Set};
use utility_billing_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::services::CreateServiceRequest,
    entity::{Role, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    services::catalog_service,
    state::AppState,
    storage::{objects::LocalObjectStore, revocation::MemoryRevocationStore},
    token::TokenService,
};
use uuid::Uuid;

/// Database url for integration flows, `None` when the flows should be skipped.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            None
        }
    }
}

pub async fn setup_state(database_url: &str, upload_dir: &Path) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;

    Ok(AppState {
        orm: orm_from_pool(&pool),
        pool,
        tokens: TokenService::new("flow-test-secret", 300),
        revocations: Arc::new(MemoryRevocationStore::default()),
        objects: Arc::new(LocalObjectStore::new(upload_dir, "http://localhost:3000")),
    })
}

/// Users get unique logins so flows can share one database.
pub async fn create_user(state: &AppState, role: Role, password_hash: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        login: Set(format!("{}-{}", role.label(), Uuid::new_v4())),
        password_hash: Set(password_hash.to_string()),
        role: Set(role),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_service(
    state: &AppState,
    manager: &AuthUser,
    title: &str,
    tariff: &str,
) -> anyhow::Result<Uuid> {
    let resp = catalog_service::create_service(
        state,
        manager,
        CreateServiceRequest {
            title: title.to_string(),
            description: format!("{title} supply"),
            unit: "unit".to_string(),
            tariff: tariff.parse()?,
        },
    )
    .await?;
    Ok(resp.data.expect("service").id)
}
