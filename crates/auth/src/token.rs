//! Signed access-token boundary.
//!
//! Access tokens are short-lived (minutes, not days — the deliberate
//! asymmetry with refresh tokens) and verified without a database round-trip.
//! Verification failures are collapsed into one opaque [`InvalidToken`]: the
//! caller never learns whether a token was expired, malformed, or forged.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use qoa_core::{TenantId, TenantType, UserId};

use crate::Role;

/// Fixed issuer claim stamped into every access token.
pub const TOKEN_ISSUER: &str = "qoa";

/// Fixed audience claim stamped into every access token.
pub const TOKEN_AUDIENCE: &str = "qoa-api";

/// Default access-token lifetime in seconds.
pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 900;

/// Claims carried by a signed access token.
///
/// Decoding is deliberately lenient where the original claims were produced by
/// untrusted or older issuers: a non-string `role` falls back to `consumer`,
/// non-string entries in `scopes` are dropped, and a `tenantType` other than
/// exactly `cpg`/`store` is treated as absent. Only `sub` and the registered
/// claims are hard requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default = "default_role", deserialize_with = "lenient_role")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_scopes")]
    pub scopes: Vec<String>,
    #[serde(
        default,
        rename = "tenantId",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenant_id: Option<String>,
    #[serde(
        default,
        rename = "tenantType",
        deserialize_with = "lenient_tenant_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenant_type: Option<TenantType>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
}

impl AccessClaims {
    /// Parse `sub` into a typed user id. `None` for a malformed subject.
    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }

    pub fn role(&self) -> Role {
        Role::new(self.role.clone())
    }

    /// Tenant claim, kept only when it parses as a UUID.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id.as_deref().and_then(|id| id.parse().ok())
    }
}

fn default_role() -> String {
    "consumer".to_string()
}

fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(role) => role,
        _ => default_role(),
    })
}

fn lenient_scopes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                JsonValue::String(scope) => Some(scope),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(value) => Some(value),
        _ => None,
    })
}

fn lenient_tenant_type<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TenantType>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(value) => TenantType::parse_opt(&value),
        _ => None,
    })
}

/// Identity to be embedded in a new access token.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub user_id: UserId,
    pub role: Role,
    pub scopes: Vec<String>,
    pub tenant_id: Option<TenantId>,
    pub tenant_type: Option<TenantType>,
}

impl AccessGrant {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            scopes: Vec::new(),
            tenant_id: None,
            tenant_type: None,
        }
    }
}

/// A freshly signed token plus its lifetime, for response bodies.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_in: i64,
}

/// Opaque verification failure.
///
/// Expired, malformed, and signature-mismatched tokens are indistinguishable
/// here on purpose.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

/// Signing failure (key misconfiguration, serialization). Infrastructure-level,
/// not part of the user-visible taxonomy.
#[derive(Debug, Error)]
#[error("token signing failed")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);

/// Creates and verifies signed, time-bounded access tokens (HS256).
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
            validation,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Sign an access token for `grant`, expiring after the configured TTL.
    pub fn sign(&self, grant: &AccessGrant) -> Result<SignedAccessToken, SigningError> {
        self.sign_at(grant, Utc::now())
    }

    fn sign_at(
        &self,
        grant: &AccessGrant,
        now: DateTime<Utc>,
    ) -> Result<SignedAccessToken, SigningError> {
        let claims = AccessClaims {
            sub: grant.user_id.to_string(),
            role: grant.role.as_str().to_string(),
            scopes: grant.scopes.clone(),
            tenant_id: grant.tenant_id.map(|id| id.to_string()),
            tenant_type: grant.tenant_type,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(SignedAccessToken {
            token,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Verify signature, expiry, issuer, and audience.
    ///
    /// Every failure mode maps to the same [`InvalidToken`]; nothing about the
    /// reason may leak past this boundary.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, InvalidToken> {
        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| InvalidToken)
    }
}
