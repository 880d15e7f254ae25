//! The authorization gate between resolution and handlers.
//!
//! The guard turns "maybe a credential" into "an enforced identity": it loads
//! the backing user for JWT credentials, applies block checks, overwrites the
//! tenant claim from the user row, then enforces the route's role and scope
//! requirements. Handlers downstream receive a vetted [`AuthContext`] in the
//! request extensions and never re-check credentials.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use qoa_auth::{AuthContext, AuthRequirement, UserAuthKind};
use qoa_infra::UserDirectory;

use crate::error::ApiError;
use crate::resolver::CredentialResolver;

/// Resolves and enforces a route's [`AuthRequirement`].
pub struct AuthorizationGuard {
    resolver: CredentialResolver,
    users: Arc<dyn UserDirectory>,
}

impl AuthorizationGuard {
    pub fn new(resolver: CredentialResolver, users: Arc<dyn UserDirectory>) -> Self {
        Self { resolver, users }
    }

    /// Full authorization pipeline for one request.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        requirement: &AuthRequirement,
    ) -> Result<AuthContext, ApiError> {
        let Some(mut ctx) = self.resolver.resolve(headers, requirement).await? else {
            return Err(ApiError::unauthorized());
        };

        // Only real JWT identities get enriched from the user row. Dev
        // override contexts are taken at face value, key contexts have no
        // backing user at all.
        if matches!(
            ctx,
            AuthContext::User {
                kind: UserAuthKind::Jwt,
                ..
            }
        ) {
            self.enrich_from_user_row(&mut ctx).await?;
        }

        if !requirement.roles.is_empty() {
            match ctx.role() {
                // Keys carry no role and never satisfy a role requirement.
                None => return Err(ApiError::forbidden()),
                Some(role) if !requirement.allows_role(role) => {
                    tracing::debug!(role = role.as_str(), "role requirement not met");
                    return Err(ApiError::forbidden());
                }
                Some(_) => {}
            }
        }

        if !requirement.scopes.is_empty()
            && !ctx.has_scopes(requirement.scopes.iter().map(String::as_str))
        {
            return Err(ApiError::insufficient_scope());
        }

        Ok(ctx)
    }

    async fn enrich_from_user_row(&self, ctx: &mut AuthContext) -> Result<(), ApiError> {
        let Some(user_id) = ctx.user_id() else {
            return Err(ApiError::invalid_token());
        };
        // A verified token whose user vanished is treated as invalid, not as
        // missing: the credential itself is the thing that no longer stands.
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(ApiError::invalid_token());
        };

        if user.is_blocked(Utc::now()) {
            return Err(ApiError::account_blocked());
        }

        // The user row wins over whatever the token claimed.
        ctx.set_user_tenant(user.tenant_id, user.tenant_type);
        Ok(())
    }
}

/// Per-route middleware state: the shared guard plus this route's requirement.
#[derive(Clone)]
pub struct GuardState {
    pub guard: Arc<AuthorizationGuard>,
    pub requirement: AuthRequirement,
}

/// Route-layer middleware: authorize, then stash the context for the handler.
pub async fn require_auth(
    State(state): State<GuardState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = state
        .guard
        .authorize(req.headers(), &state.requirement)
        .await?;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
