//! Postgres-backed credential store.
//!
//! ## Tenant isolation
//!
//! Rows are fetched by credential hash or primary key only; tenant scoping of
//! business queries happens upstream via `qoa_auth::policy::tenant_filter`.
//!
//! ## Rotation race
//!
//! `consume` is a single conditional UPDATE (`WHERE … AND revoked_at IS NULL`)
//! returning the row it revoked. Two racing calls presenting the same token
//! can therefore never both succeed; the loser observes zero affected rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use qoa_auth::Role;
use qoa_core::{ApiKeyId, RefreshTokenId, TenantId, TenantType, UserId};

use crate::error::{StoreError, StoreResult};

use super::{
    ApiKeyRecord, ApiKeyStore, RefreshSessionRecord, RefreshTokenStore, UserDirectory,
    UserRecord, UserStatus,
};

/// Postgres implementation of all three store traits.
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_tenant_type(value: &str) -> StoreResult<TenantType> {
    TenantType::parse_opt(value)
        .ok_or_else(|| StoreError::corrupt_row(format!("tenant_type: {value}")))
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<UserRecord> {
    let status: String = row.try_get("status")?;
    let status = UserStatus::parse_opt(&status)
        .ok_or_else(|| StoreError::corrupt_row(format!("user status: {status}")))?;
    let role: String = row.try_get("role")?;
    let tenant_type: Option<String> = row.try_get("tenant_type")?;
    let tenant_type = tenant_type
        .as_deref()
        .map(parse_tenant_type)
        .transpose()?;

    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::new(role),
        status,
        blocked_until: row.try_get("blocked_until")?,
        tenant_id: row
            .try_get::<Option<Uuid>, _>("tenant_id")?
            .map(TenantId::from_uuid),
        tenant_type,
    })
}

#[async_trait]
impl ApiKeyStore for PgAuthStore {
    async fn find_active_by_hash(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ApiKeyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, scopes, tenant_id, tenant_type::text AS tenant_type
            FROM api_keys
            WHERE key_hash = $1
              AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(key_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tenant_type: String = row.try_get("tenant_type")?;
        Ok(Some(ApiKeyRecord {
            id: ApiKeyId::from_uuid(row.try_get::<Uuid, _>("id")?),
            scopes: row.try_get("scopes")?,
            tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            tenant_type: parse_tenant_type(&tenant_type)?,
        }))
    }

    async fn touch_last_used(&self, id: ApiKeyId, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PgAuthStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, phone, password_hash, role::text AS role,
                   status::text AS status, blocked_until, tenant_id,
                   tenant_type::text AS tenant_type
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, phone, password_hash, role::text AS role,
                   status::text AS status, blocked_until, tenant_id,
                   tenant_type::text AS tenant_type
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl RefreshTokenStore for PgAuthStore {
    async fn insert(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenId> {
        let row = sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(RefreshTokenId::from_uuid(row.try_get::<Uuid, _>("id")?))
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshSessionRecord>> {
        let row = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > $2
            RETURNING id, user_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(RefreshSessionRecord {
            id: RefreshTokenId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        }))
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token_hash = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
