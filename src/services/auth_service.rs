use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{LoginRequest, LoginResponse, LogoutResponse, RegisterRequest},
    entity::{
        Role,
        users::{self, ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{User, user_from_entity},
    password::{PasswordCheck, hash_password, verify_decoy, verify_password},
    response::{ApiResponse, Meta},
    services::session_service,
    state::AppState,
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let login = payload.login.trim().to_string();
    if login.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "login and password are required".to_string(),
        ));
    }

    let exist = Users::find()
        .filter(UserCol::Login.eq(login.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest("Login is already taken".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        login: Set(login),
        password_hash: Set(password_hash),
        role: Set(Role::Buyer),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(user),
        None,
    ))
}

/// Resolve credentials to a user; unknown login and wrong password are
/// indistinguishable to the caller, in result and in argon2 work done.
pub async fn authenticate(
    state: &AppState,
    login: &str,
    password: &str,
) -> AppResult<users::Model> {
    let Some(user) = Users::find()
        .filter(UserCol::Login.eq(login.trim()))
        .one(&state.orm)
        .await?
    else {
        verify_decoy(password);
        return Err(AppError::Unauthorized);
    };

    match verify_password(password, &user.password_hash) {
        PasswordCheck::Valid { needs_rehash } => {
            if needs_rehash {
                rehash(state, &user, password).await;
            }
            Ok(user)
        }
        PasswordCheck::Invalid => Err(AppError::Unauthorized),
        PasswordCheck::Unsupported => {
            tracing::warn!(user_id = %user.id, "stored password is not an argon2 hash; login refused");
            verify_decoy(password);
            Err(AppError::Unauthorized)
        }
    }
}

async fn rehash(state: &AppState, user: &users::Model, password: &str) {
    let result = async {
        let password_hash = hash_password(password)?;
        let mut active: UserActive = user.clone().into();
        active.password_hash = Set(password_hash);
        active.update(&state.orm).await?;
        anyhow::Ok(())
    }
    .await;

    match result {
        Ok(()) => tracing::info!(user_id = %user.id, "password hash upgraded"),
        Err(err) => tracing::warn!(user_id = %user.id, error = %err, "password rehash failed"),
    }
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let user = authenticate(state, &payload.login, &payload.password).await?;
    let token = state.tokens.issue(user.id, user.role)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let resp = LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl_secs(),
        user_id: user.id,
        role: user.role,
    };
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn logout_user(
    state: &AppState,
    user: &AuthUser,
    token: &str,
) -> AppResult<ApiResponse<LogoutResponse>> {
    let ttl = session_service::revoke_session(&state.tokens, state.revocations.as_ref(), token).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "user_logout",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged out",
        LogoutResponse {
            revoked_for: ttl.as_secs(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Me", user_from_entity(model), None))
}
