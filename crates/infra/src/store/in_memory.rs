//! In-memory credential store for tests/dev.
//!
//! Mirrors the Postgres semantics, including the atomic consume: the refresh
//! rows live behind one mutex so find-and-revoke happens under a single lock.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use qoa_core::{ApiKeyId, RefreshTokenId, UserId};

use crate::error::{StoreError, StoreResult};

use super::{
    ApiKeyRecord, ApiKeyStore, RefreshSessionRecord, RefreshTokenStore, UserDirectory, UserRecord,
};

#[derive(Debug, Clone)]
struct ApiKeyRow {
    record: ApiKeyRecord,
    key_hash: String,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct RefreshRow {
    id: RefreshTokenId,
    user_id: UserId,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

/// In-memory implementation of all three store traits.
#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    api_keys: Mutex<Vec<ApiKeyRow>>,
    users: Mutex<HashMap<UserId, UserRecord>>,
    refresh_tokens: Mutex<Vec<RefreshRow>>,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user row.
    pub fn insert_user(&self, user: UserRecord) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.id, user);
        }
    }

    /// Seed an API-key row by credential hash.
    pub fn insert_api_key(
        &self,
        record: ApiKeyRecord,
        key_hash: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        revoked_at: Option<DateTime<Utc>>,
    ) {
        if let Ok(mut keys) = self.api_keys.lock() {
            keys.push(ApiKeyRow {
                record,
                key_hash: key_hash.into(),
                expires_at,
                revoked_at,
                last_used_at: None,
            });
        }
    }

    /// Test observability: when was this key last used?
    pub fn api_key_last_used(&self, id: ApiKeyId) -> Option<DateTime<Utc>> {
        let keys = self.api_keys.lock().ok()?;
        keys.iter()
            .find(|row| row.record.id == id)
            .and_then(|row| row.last_used_at)
    }

    /// Test observability: count refresh rows (active and revoked) for a user.
    pub fn refresh_rows_for(&self, user_id: UserId) -> usize {
        self.refresh_tokens
            .lock()
            .map(|rows| rows.iter().filter(|r| r.user_id == user_id).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryAuthStore {
    async fn find_active_by_hash(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ApiKeyRecord>> {
        let keys = self.api_keys.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(keys
            .iter()
            .find(|row| {
                row.key_hash == key_hash
                    && row.revoked_at.is_none()
                    && row.expires_at.is_none_or(|at| at > now)
            })
            .map(|row| row.record.clone()))
    }

    async fn touch_last_used(&self, id: ApiKeyId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut keys = self.api_keys.lock().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(row) = keys.iter_mut().find(|row| row.record.id == id) {
            row.last_used_at = Some(now);
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryAuthStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let users = self.users.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let users = self.users.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(users
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryAuthStore {
    async fn insert(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenId> {
        let mut rows = self
            .refresh_tokens
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        let id = RefreshTokenId::new();
        rows.push(RefreshRow {
            id,
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            revoked_at: None,
        });
        Ok(id)
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshSessionRecord>> {
        // Single critical section: the winner marks the row revoked, the loser
        // sees it already revoked and gets None.
        let mut rows = self
            .refresh_tokens
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        let Some(row) = rows.iter_mut().find(|row| {
            row.token_hash == token_hash && row.revoked_at.is_none() && row.expires_at > now
        }) else {
            return Ok(None);
        };
        row.revoked_at = Some(now);
        Ok(Some(RefreshSessionRecord {
            id: row.id,
            user_id: row.user_id,
        }))
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut rows = self
            .refresh_tokens
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        for row in rows.iter_mut() {
            if row.token_hash == token_hash && row.revoked_at.is_none() {
                row.revoked_at = Some(now);
            }
        }
        Ok(())
    }
}
