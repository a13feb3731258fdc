use axum::{extract::FromRequestParts, http::header};
use uuid::Uuid;

use crate::{
    entity::Role,
    error::AppError,
    services::session_service,
    state::AppState,
    token::bearer_token,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ResolveRequests,
    ManageCatalog,
    OverrideTariff,
    ViewAllRequests,
}

impl Role {
    /// The one place that decides what each role may do.
    pub fn can(&self, capability: Capability) -> bool {
        match self {
            Role::Buyer => false,
            Role::Manager | Role::Admin => matches!(
                capability,
                Capability::ResolveRequests
                    | Capability::ManageCatalog
                    | Capability::OverrideTariff
                    | Capability::ViewAllRequests
            ),
        }
    }
}

impl AuthUser {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

pub fn ensure_capability(user: &AuthUser, capability: Capability) -> Result<(), AppError> {
    if !user.can(capability) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Raw token of an authenticated request, kept for logout.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl FromRequestParts<AppState> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_str = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?
            .to_str()
            .map_err(|_| AppError::Unauthorized)?;

        let token = bearer_token(auth_str).ok_or(AppError::Unauthorized)?;
        Ok(BearerToken(token.to_string()))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        if session_service::is_blacklisted(state.revocations.as_ref(), &token).await? {
            tracing::debug!("revoked token presented");
            return Err(AppError::Forbidden);
        }

        let claims = state
            .tokens
            .verify(&token)
            .map_err(|_| AppError::Unauthorized)?;
        let user_id = claims.subject().ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            user_id,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Iterable;

    use super::*;

    const ALL: [Capability; 4] = [
        Capability::ResolveRequests,
        Capability::ManageCatalog,
        Capability::OverrideTariff,
        Capability::ViewAllRequests,
    ];

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn buyers_hold_no_capability() {
        for cap in ALL {
            assert!(!Role::Buyer.can(cap));
            assert!(matches!(
                ensure_capability(&user(Role::Buyer), cap),
                Err(AppError::Forbidden)
            ));
        }
    }

    #[test]
    fn moderators_hold_every_capability() {
        for role in Role::iter().filter(|r| *r != Role::Buyer) {
            for cap in ALL {
                assert!(ensure_capability(&user(role), cap).is_ok(), "{role:?} {cap:?}");
            }
        }
    }
}
