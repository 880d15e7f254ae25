//! Persistence boundary for credentials and identity lookups.
//!
//! Three narrow traits instead of one repository: the credential resolver
//! needs API keys, the authorization guard needs user rows, and the refresh
//! lifecycle needs token rows. Implementations may (and do) live on one
//! struct, but consumers only see the slice they depend on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use qoa_auth::Role;
use qoa_core::{ApiKeyId, RefreshTokenId, TenantId, TenantType, UserId};

use crate::error::StoreResult;

pub mod in_memory;
pub mod postgres;

/// User account status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }

    pub fn parse_opt(value: &str) -> Option<Self> {
        match value {
            "active" => Some(UserStatus::Active),
            "suspended" => Some(UserStatus::Suspended),
            _ => None,
        }
    }
}

/// A user row as read by this core. Lifecycle is owned elsewhere; the auth
/// core only reads it (and never trusts token claims over it).
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub email: Option<String>,
    pub phone: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub blocked_until: Option<DateTime<Utc>>,
    pub tenant_id: Option<TenantId>,
    pub tenant_type: Option<TenantType>,
}

impl UserRecord {
    /// Suspended, or inside an explicit block window.
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.status == UserStatus::Suspended
            || self.blocked_until.is_some_and(|until| until > now)
    }
}

/// The slice of an API-key row the resolver consumes.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub scopes: Vec<String>,
    pub tenant_id: TenantId,
    pub tenant_type: TenantType,
}

/// An active refresh-token row, as returned by a successful consume.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSessionRecord {
    pub id: RefreshTokenId,
    pub user_id: UserId,
}

/// API-key lookups (hash-based) and usage stamping.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Find a non-revoked, non-expired key by credential hash.
    async fn find_active_by_hash(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ApiKeyRecord>>;

    /// Stamp `last_used_at` after a successful key authentication.
    async fn touch_last_used(&self, id: ApiKeyId, now: DateTime<Utc>) -> StoreResult<()>;
}

/// Read-only user lookups for guard enrichment and login.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>>;

    /// Lookup by exact email; callers lowercase first.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
}

/// Refresh-token persistence.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenId>;

    /// Atomically revoke the active row matching `token_hash`.
    ///
    /// Returns the row only when *this call* performed the revocation — the
    /// find-and-mark must be a single conditional update so two concurrent
    /// consumers of the same token cannot both succeed. Never-issued, already
    /// rotated, expired, and revoked tokens are indistinguishable (`None`).
    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshSessionRecord>>;

    /// Revoke by hash. Idempotent; unknown hashes are not an error.
    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn user(status: UserStatus, blocked_until: Option<DateTime<Utc>>) -> UserRecord {
        UserRecord {
            id: UserId::new(),
            email: Some("ana@example.com".to_string()),
            phone: "+5215512345678".to_string(),
            password_hash: None,
            role: Role::consumer(),
            status,
            blocked_until,
            tenant_id: None,
            tenant_type: None,
        }
    }

    #[test]
    fn suspended_users_are_blocked() {
        let now = Utc::now();
        assert!(user(UserStatus::Suspended, None).is_blocked(now));
        assert!(!user(UserStatus::Active, None).is_blocked(now));
    }

    #[test]
    fn block_window_only_counts_while_in_the_future() {
        let now = Utc::now();
        let future = Some(now + Duration::hours(1));
        let past = Some(now - Duration::hours(1));
        assert!(user(UserStatus::Active, future).is_blocked(now));
        assert!(!user(UserStatus::Active, past).is_blocked(now));
    }
}
