mod common;

use argon2::{
    Algorithm, Argon2, Params, PasswordHasher, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use sea_orm::EntityTrait;
use utility_billing_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    entity::{Role, Users},
    error::AppError,
    services::{auth_service, session_service},
};
use uuid::Uuid;

#[tokio::test]
async fn register_login_and_logout() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;
    let login = format!("resident-{}", Uuid::new_v4());

    let user = auth_service::register_user(
        &state,
        RegisterRequest {
            login: login.clone(),
            password: "pa55word".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(user.role, Role::Buyer);

    let dup = auth_service::register_user(
        &state,
        RegisterRequest {
            login: login.clone(),
            password: "other".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(dup, AppError::BadRequest(_)));

    let wrong = auth_service::authenticate(&state, &login, "nope").await.unwrap_err();
    let unknown = auth_service::authenticate(&state, "no-such-login", "pa55word").await.unwrap_err();
    assert!(matches!(wrong, AppError::Unauthorized));
    assert!(matches!(unknown, AppError::Unauthorized));

    let session = auth_service::login_user(
        &state,
        LoginRequest {
            login,
            password: "pa55word".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.user_id, user.id);
    assert_eq!(session.expires_in, 300);

    let claims = state.tokens.verify(&session.access_token).unwrap();
    assert_eq!(claims.subject(), Some(user.id));

    let ttl = session_service::revoke_session(&state.tokens, state.revocations.as_ref(), &session.access_token).await?;
    assert!(ttl.as_secs() <= 300);
    assert!(session_service::is_blacklisted(state.revocations.as_ref(), &session.access_token).await?);
    Ok(())
}

#[tokio::test]
async fn legacy_hashes_are_refused_and_weak_ones_upgraded() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else { return Ok(()) };
    let dir = tempfile::tempdir()?;
    let state = common::setup_state(&url, dir.path()).await?;

    let legacy = common::create_user(&state, Role::Buyer, "plaintext-secret").await?;
    let legacy_login = Users::find_by_id(legacy.user_id).one(&state.orm).await?.unwrap().login;
    let err = auth_service::authenticate(&state, &legacy_login, "plaintext-secret")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let salt = SaltString::generate(&mut OsRng);
    let weak_hash = Argon2::new(Algorithm::Argon2i, Version::V0x13, Params::default())
        .hash_password(b"pw", &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    let weak = common::create_user(&state, Role::Buyer, &weak_hash).await?;
    let weak_login = Users::find_by_id(weak.user_id).one(&state.orm).await?.unwrap().login;

    auth_service::authenticate(&state, &weak_login, "pw").await?;
    let stored = Users::find_by_id(weak.user_id).one(&state.orm).await?.unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"), "{}", stored.password_hash);

    // the upgraded hash still verifies
    auth_service::authenticate(&state, &weak_login, "pw").await?;
    Ok(())
}
