//! Credential resolution: headers in, [`AuthContext`] out.
//!
//! Resolution order is security-relevant and fixed:
//!
//! 1. developer-override headers (only when the override is active),
//! 2. API key (dedicated header, or a bearer token carrying the reserved
//!    prefix when the route allows keys),
//! 3. bearer JWT.
//!
//! A presented API-key credential that misses the store terminates resolution;
//! it is never retried as a JWT. A bearer token with the reserved prefix on a
//! route that does not allow keys falls through to JWT verification, where it
//! fails as malformed.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;

use qoa_auth::{AuthContext, AuthRequirement, KeyAuthKind, Role, TokenIssuer, UserAuthKind};
use qoa_core::TenantType;
use qoa_infra::{hash_credential, ApiKeyStore, StoreResult};

use crate::config::AuthMode;

/// Dedicated API-key header.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Prefix reserved for provisioned API keys. A bearer token starting with this
/// is a key credential, not a JWT.
pub const RESERVED_KEY_PREFIX: &str = "qoa_";

const DEV_AUTH_TYPE_HEADER: &str = "x-dev-auth-type";
const DEV_USER_ID_HEADER: &str = "x-dev-user-id";
const DEV_USER_ROLE_HEADER: &str = "x-dev-user-role";
const DEV_USER_SCOPES_HEADER: &str = "x-dev-user-scopes";
const DEV_API_KEY_ID_HEADER: &str = "x-dev-api-key-id";
const DEV_API_KEY_SCOPES_HEADER: &str = "x-dev-api-key-scopes";
const DEV_TENANT_ID_HEADER: &str = "x-dev-tenant-id";
const DEV_TENANT_TYPE_HEADER: &str = "x-dev-tenant-type";

/// Turns request headers into an authenticated context, or `None` when no
/// credential resolves. Failure reasons are not surfaced past this boundary.
#[derive(Clone)]
pub struct CredentialResolver {
    issuer: Arc<TokenIssuer>,
    api_keys: Arc<dyn ApiKeyStore>,
    mode: AuthMode,
}

impl CredentialResolver {
    pub fn new(issuer: Arc<TokenIssuer>, api_keys: Arc<dyn ApiKeyStore>, mode: AuthMode) -> Self {
        Self {
            issuer,
            api_keys,
            mode,
        }
    }

    /// Resolve the request's credential, if any.
    ///
    /// `Ok(None)` means "no authenticated identity"; the caller decides what
    /// that costs. `Err` is reserved for store failures.
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        requirement: &AuthRequirement,
    ) -> StoreResult<Option<AuthContext>> {
        if self.mode.dev_override_active() {
            if let Some(ctx) = resolve_dev(headers) {
                tracing::debug!("request authenticated via dev override");
                return Ok(Some(ctx));
            }
        }

        let bearer = bearer_token(headers);

        let key_candidate = header_str(headers, API_KEY_HEADER).or_else(|| {
            bearer.filter(|token| token.starts_with(RESERVED_KEY_PREFIX))
        });

        if let Some(raw_key) = key_candidate {
            // Only consult the key store when the route allows keys, or when
            // the credential arrived outside the bearer slot.
            if requirement.allow_api_key || bearer.is_none() {
                return self.resolve_api_key(raw_key).await;
            }
        }

        let Some(token) = bearer else {
            return Ok(None);
        };
        Ok(self.resolve_jwt(token))
    }

    async fn resolve_api_key(&self, raw_key: &str) -> StoreResult<Option<AuthContext>> {
        let now = Utc::now();
        let Some(record) = self
            .api_keys
            .find_active_by_hash(&hash_credential(raw_key), now)
            .await?
        else {
            // A presented key that misses is terminal; no JWT fallback.
            tracing::debug!("api key rejected");
            return Ok(None);
        };

        self.api_keys.touch_last_used(record.id, now).await?;

        Ok(Some(AuthContext::Key {
            kind: KeyAuthKind::ApiKey,
            api_key_id: record.id,
            scopes: record.scopes.into_iter().collect(),
            tenant_id: record.tenant_id,
            tenant_type: record.tenant_type,
        }))
    }

    fn resolve_jwt(&self, token: &str) -> Option<AuthContext> {
        let claims = self.issuer.verify(token).ok()?;
        // A verified token with an unparseable subject is still unusable.
        let user_id = claims.user_id()?;

        Some(AuthContext::User {
            kind: UserAuthKind::Jwt,
            user_id,
            role: claims.role(),
            scopes: claims.scopes.iter().cloned().collect(),
            tenant_id: claims.tenant_id(),
            tenant_type: claims.tenant_type,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "authorization")?.strip_prefix("Bearer ")
}

fn split_scopes(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Assemble a context straight from dev headers, no store involved.
///
/// Any malformed piece (bad UUID, unknown tenant type) makes the whole
/// override miss, and resolution falls through to the real credential paths.
fn resolve_dev(headers: &HeaderMap) -> Option<AuthContext> {
    let tenant_id = header_str(headers, DEV_TENANT_ID_HEADER);
    let tenant_type =
        header_str(headers, DEV_TENANT_TYPE_HEADER).and_then(TenantType::parse_opt);

    if header_str(headers, DEV_AUTH_TYPE_HEADER) == Some("api_key") {
        // All four pieces are required; a partial dev key never resolves.
        let api_key_id = header_str(headers, DEV_API_KEY_ID_HEADER)?.parse().ok()?;
        let tenant_id = tenant_id?.parse().ok()?;
        let tenant_type = tenant_type?;
        let scopes = split_scopes(Some(header_str(headers, DEV_API_KEY_SCOPES_HEADER)?));

        return Some(AuthContext::Key {
            kind: KeyAuthKind::DevApiKey,
            api_key_id,
            scopes,
            tenant_id,
            tenant_type,
        });
    }

    let user_id = header_str(headers, DEV_USER_ID_HEADER)?.parse().ok()?;
    let role = header_str(headers, DEV_USER_ROLE_HEADER)
        .map(|role| Role::new(role.to_string()))
        .unwrap_or_else(Role::consumer);

    Some(AuthContext::User {
        kind: UserAuthKind::Dev,
        user_id,
        role,
        scopes: split_scopes(header_str(headers, DEV_USER_SCOPES_HEADER)),
        tenant_id: tenant_id.and_then(|id| id.parse().ok()),
        tenant_type,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::Duration;

    use qoa_auth::{AccessGrant, DEFAULT_ACCESS_TTL_SECONDS};
    use qoa_core::{ApiKeyId, TenantId, UserId};
    use qoa_infra::{ApiKeyRecord, InMemoryAuthStore};

    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn seeded_key(store: &InMemoryAuthStore, raw: &str) -> ApiKeyId {
        let id = ApiKeyId::new();
        store.insert_api_key(
            ApiKeyRecord {
                id,
                scopes: vec!["cards:read".to_string()],
                tenant_id: TenantId::new(),
                tenant_type: TenantType::Store,
            },
            hash_credential(raw),
            Some(Utc::now() + Duration::days(1)),
            None,
        );
        id
    }

    fn resolver(store: Arc<InMemoryAuthStore>, mode: AuthMode) -> CredentialResolver {
        CredentialResolver::new(
            Arc::new(TokenIssuer::new("test-secret", DEFAULT_ACCESS_TTL_SECONDS)),
            store,
            mode,
        )
    }

    #[tokio::test]
    async fn no_credential_resolves_to_none() {
        let resolver = resolver(Arc::new(InMemoryAuthStore::new()), AuthMode::production());
        let ctx = resolver
            .resolve(&HeaderMap::new(), &AuthRequirement::new())
            .await
            .unwrap();
        assert!(ctx.is_none());
    }

    #[tokio::test]
    async fn api_key_header_resolves_and_stamps_last_used() {
        let store = Arc::new(InMemoryAuthStore::new());
        let id = seeded_key(&store, "qoa_live_abc");
        let resolver = resolver(store.clone(), AuthMode::production());

        let ctx = resolver
            .resolve(
                &headers(&[(API_KEY_HEADER, "qoa_live_abc")]),
                &AuthRequirement::new(),
            )
            .await
            .unwrap()
            .expect("key should resolve");

        assert!(ctx.is_key_bound());
        assert!(ctx.has_scopes(["cards:read"]));
        assert!(store.api_key_last_used(id).is_some());
    }

    #[tokio::test]
    async fn api_key_miss_does_not_fall_through_to_jwt() {
        let store = Arc::new(InMemoryAuthStore::new());
        let resolver = resolver(store, AuthMode::production());

        let signed = TokenIssuer::new("test-secret", DEFAULT_ACCESS_TTL_SECONDS)
            .sign(&AccessGrant::new(UserId::new(), Role::consumer()))
            .unwrap();

        // Valid JWT alongside an unknown key: the key path wins and misses.
        let ctx = resolver
            .resolve(
                &headers(&[
                    (API_KEY_HEADER, "qoa_unknown"),
                    ("authorization", &format!("Bearer {}", signed.token)),
                ]),
                &AuthRequirement::new().allow_api_key(),
            )
            .await
            .unwrap();
        assert!(ctx.is_none());
    }

    #[tokio::test]
    async fn prefixed_bearer_is_a_key_only_when_the_route_allows_keys() {
        let store = Arc::new(InMemoryAuthStore::new());
        seeded_key(&store, "qoa_live_abc");
        let resolver = resolver(store, AuthMode::production());
        let bearer = headers(&[("authorization", "Bearer qoa_live_abc")]);

        let allowed = resolver
            .resolve(&bearer, &AuthRequirement::new().allow_api_key())
            .await
            .unwrap();
        assert!(allowed.is_some_and(|ctx| ctx.is_key_bound()));

        // Without the allowance the prefixed bearer is treated as a JWT,
        // which it is not.
        let denied = resolver
            .resolve(&bearer, &AuthRequirement::new())
            .await
            .unwrap();
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn bearer_jwt_resolves_to_a_user_context() {
        let resolver = resolver(Arc::new(InMemoryAuthStore::new()), AuthMode::production());
        let user_id = UserId::new();
        let mut grant = AccessGrant::new(user_id, Role::new("store_admin"));
        grant.scopes = vec!["cards:read".to_string()];
        let signed = TokenIssuer::new("test-secret", DEFAULT_ACCESS_TTL_SECONDS)
            .sign(&grant)
            .unwrap();

        let ctx = resolver
            .resolve(
                &headers(&[("authorization", &format!("Bearer {}", signed.token))]),
                &AuthRequirement::new(),
            )
            .await
            .unwrap()
            .expect("jwt should resolve");

        assert_eq!(ctx.user_id(), Some(user_id));
        assert_eq!(ctx.role().map(Role::as_str), Some("store_admin"));
        assert!(ctx.has_scopes(["cards:read"]));
    }

    #[tokio::test]
    async fn dev_headers_are_dead_in_production() {
        let resolver = resolver(Arc::new(InMemoryAuthStore::new()), AuthMode::production());
        let ctx = resolver
            .resolve(
                &headers(&[(DEV_USER_ID_HEADER, &UserId::new().to_string())]),
                &AuthRequirement::new(),
            )
            .await
            .unwrap();
        assert!(ctx.is_none());
    }

    #[tokio::test]
    async fn dev_user_headers_resolve_when_the_override_is_active() {
        let resolver = resolver(
            Arc::new(InMemoryAuthStore::new()),
            AuthMode::development(true),
        );
        let user_id = UserId::new();
        let ctx = resolver
            .resolve(
                &headers(&[
                    (DEV_USER_ID_HEADER, &user_id.to_string()),
                    (DEV_USER_ROLE_HEADER, "qoa_admin"),
                    (DEV_USER_SCOPES_HEADER, "cards:read, cards:write ,"),
                ]),
                &AuthRequirement::new(),
            )
            .await
            .unwrap()
            .expect("dev user should resolve");

        assert_eq!(ctx.user_id(), Some(user_id));
        assert_eq!(ctx.role().map(Role::as_str), Some("qoa_admin"));
        assert!(ctx.has_scopes(["cards:read", "cards:write"]));
        assert!(matches!(
            ctx,
            AuthContext::User {
                kind: UserAuthKind::Dev,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn dev_key_headers_require_all_four_pieces() {
        let resolver = resolver(
            Arc::new(InMemoryAuthStore::new()),
            AuthMode::development(true),
        );
        let full = [
            (DEV_AUTH_TYPE_HEADER, "api_key".to_string()),
            (DEV_API_KEY_ID_HEADER, ApiKeyId::new().to_string()),
            (DEV_TENANT_ID_HEADER, TenantId::new().to_string()),
            (DEV_TENANT_TYPE_HEADER, "cpg".to_string()),
            (DEV_API_KEY_SCOPES_HEADER, "cards:read".to_string()),
        ];

        // Any missing piece (beyond the type marker) makes the override miss.
        for dropped in 1..full.len() {
            let partial: Vec<(&str, &str)> = full
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != dropped)
                .map(|(_, (name, value))| (*name, value.as_str()))
                .collect();
            let ctx = resolver
                .resolve(&headers(&partial), &AuthRequirement::new())
                .await
                .unwrap();
            assert!(ctx.is_none(), "missing {} should not resolve", full[dropped].0);
        }

        let complete: Vec<(&str, &str)> = full
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        let ctx = resolver
            .resolve(&headers(&complete), &AuthRequirement::new())
            .await
            .unwrap()
            .expect("complete dev key should resolve");
        assert!(matches!(
            ctx,
            AuthContext::Key {
                kind: KeyAuthKind::DevApiKey,
                ..
            }
        ));
        assert!(ctx.has_scopes(["cards:read"]));
    }

    #[tokio::test]
    async fn malformed_dev_user_id_falls_through_to_real_credentials() {
        let store = Arc::new(InMemoryAuthStore::new());
        seeded_key(&store, "qoa_live_abc");
        let resolver = resolver(store, AuthMode::development(true));

        let ctx = resolver
            .resolve(
                &headers(&[
                    (DEV_USER_ID_HEADER, "not-a-uuid"),
                    (API_KEY_HEADER, "qoa_live_abc"),
                ]),
                &AuthRequirement::new(),
            )
            .await
            .unwrap()
            .expect("key should still resolve");
        assert!(ctx.is_key_bound());
    }

    #[test]
    fn scope_header_splitting_trims_and_drops_empties() {
        let scopes = split_scopes(Some(" a , b ,, c"));
        let expected: BTreeSet<String> =
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(scopes, expected);
        assert!(split_scopes(None).is_empty());
        assert!(split_scopes(Some("  ,")).is_empty());
    }
}
