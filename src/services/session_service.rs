use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::{
    error::{AppError, AppResult},
    storage::revocation::RevocationStore,
    token::{TokenError, TokenService},
};

const REVOKED_PREFIX: &str = "session.revoked.";

/// Store key for a revoked token; the raw token never reaches the store.
pub fn revocation_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{REVOKED_PREFIX}{}", hex::encode(digest))
}

pub async fn blacklist(
    store: &dyn RevocationStore,
    token: &str,
    ttl: Duration,
) -> AppResult<()> {
    store.set(&revocation_key(token), "1", ttl).await?;
    Ok(())
}

pub async fn is_blacklisted(store: &dyn RevocationStore, token: &str) -> AppResult<bool> {
    Ok(store.get(&revocation_key(token)).await?.is_some())
}

/// Revoke `token` for the rest of its natural lifetime and return that lifetime.
pub async fn revoke_session(
    tokens: &TokenService,
    store: &dyn RevocationStore,
    token: &str,
) -> AppResult<Duration> {
    let claims = tokens.verify(token).map_err(|err| match err {
        TokenError::Expired => AppError::BadRequest("token already expired".into()),
        TokenError::Invalid => AppError::BadRequest("malformed token".into()),
    })?;

    let ttl = TokenService::remaining(&claims)
        .ok_or_else(|| AppError::BadRequest("token already expired".into()))?;

    blacklist(store, token, ttl).await?;
    tracing::info!(sub = %claims.sub, ttl_secs = ttl.as_secs(), "session revoked");
    Ok(ttl)
}
