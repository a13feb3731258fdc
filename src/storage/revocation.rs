//! TTL key-value store for logged-out sessions.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use moka::{Expiry, sync::Cache};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set, sea_query::OnConflict};

use crate::{
    db::OrmConn,
    entity::revoked_sessions::{ActiveModel, Column, Entity as RevokedSessions},
};

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Store `value` under `key` for exactly `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    /// Live value under `key`; expired entries read as absent.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
}

/// Revocation list kept in the `revoked_sessions` table.
pub struct PgRevocationStore {
    orm: OrmConn,
}

impl PgRevocationStore {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let result = RevokedSessions::delete_many()
            .filter(Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl)?;
        let row = ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            expires_at: Set(expires_at.fixed_offset()),
        };

        RevokedSessions::insert(row)
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_columns([Column::Value, Column::ExpiresAt])
                    .to_owned(),
            )
            .exec(&self.orm)
            .await?;

        match self.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "expired revocations purged"),
            Err(err) => tracing::warn!(error = %err, "revocation purge failed"),
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = RevokedSessions::find_by_id(key.to_string())
            .filter(Column::ExpiresAt.gt(Utc::now().fixed_offset()))
            .one(&self.orm)
            .await?;
        Ok(row.map(|r| r.value))
    }
}

struct PerEntryTtl;

impl Expiry<String, (String, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(String, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &(String, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// In-process revocation list; entries vanish with the process. The cache has
/// no size bound: an entry may only leave once its own TTL has run out.
pub struct MemoryRevocationStore {
    inner: Cache<String, (String, Duration)>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        self.inner
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.inner.get(key).map(|(value, _)| value))
    }
}
