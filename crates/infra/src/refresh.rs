//! Refresh-token lifecycle: issue, rotate, revoke.
//!
//! Refresh tokens are long-lived opaque credentials (days, not minutes),
//! stored only as hashes. Rotation is single-use: the presented token is
//! revoked *before* its replacement is issued, so a crash between the two
//! steps leaves the session merely expired-early — never two simultaneously
//! valid tokens. Reuse of a rotated token fails, which doubles as replay
//! detection.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use qoa_core::UserId;

use crate::crypto::{generate_opaque_token, hash_credential};
use crate::error::StoreResult;
use crate::store::RefreshTokenStore;

/// Default refresh-token lifetime in days.
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;

/// A freshly issued refresh token. The raw token leaves the process exactly
/// once, in the response that carries it.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful rotation.
#[derive(Debug, Clone)]
pub struct RotatedRefreshToken {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, rotates, and revokes refresh tokens against a backing store.
#[derive(Clone)]
pub struct RefreshTokenLifecycle {
    store: Arc<dyn RefreshTokenStore>,
    ttl: Duration,
}

impl RefreshTokenLifecycle {
    pub fn new(store: Arc<dyn RefreshTokenStore>, ttl_days: i64) -> Self {
        Self {
            store,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Generate and persist a fresh token for `user_id`.
    pub async fn issue(&self, user_id: UserId) -> StoreResult<IssuedRefreshToken> {
        let token = generate_opaque_token();
        let expires_at = Utc::now() + self.ttl;
        self.store
            .insert(user_id, &hash_credential(&token), expires_at)
            .await?;
        Ok(IssuedRefreshToken { token, expires_at })
    }

    /// Exchange `presented` for a fresh token, exactly once per issued token.
    ///
    /// `None` covers never-issued, already-rotated, expired, and revoked
    /// alike; callers cannot distinguish them (anti-enumeration).
    pub async fn rotate(&self, presented: &str) -> StoreResult<Option<RotatedRefreshToken>> {
        let now = Utc::now();
        let Some(session) = self
            .store
            .consume(&hash_credential(presented), now)
            .await?
        else {
            tracing::debug!("refresh rotation rejected");
            return Ok(None);
        };

        // The old row is already revoked at this point (revoke-then-issue).
        let issued = self.issue(session.user_id).await?;
        Ok(Some(RotatedRefreshToken {
            user_id: session.user_id,
            token: issued.token,
            expires_at: issued.expires_at,
        }))
    }

    /// Revoke `presented` (logout). Idempotent.
    pub async fn revoke(&self, presented: &str) -> StoreResult<()> {
        self.store
            .revoke(&hash_credential(presented), Utc::now())
            .await
    }
}
