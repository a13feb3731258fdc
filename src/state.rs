use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    storage::{objects::ObjectStore, revocation::RevocationStore},
    token::TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub tokens: TokenService,
    pub revocations: Arc<dyn RevocationStore>,
    pub objects: Arc<dyn ObjectStore>,
}
