//! Router assembly and the session endpoints.
//!
//! Guarded routes get a per-route [`AuthRequirement`] enforced by middleware;
//! handlers read the vetted [`AuthContext`] from extensions. Success bodies
//! are wrapped in `{"data": …}`, failures in `{"error": …}`.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use qoa_auth::{AccessGrant, AuthContext, AuthRequirement, Role, TokenIssuer};
use qoa_infra::{
    ApiKeyStore, InMemoryAuthStore, RefreshTokenLifecycle, RefreshTokenStore, UserDirectory,
    UserRecord,
};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::guard::{require_auth, AuthorizationGuard, GuardState};
use crate::resolver::CredentialResolver;

/// The three store slices the auth core runs on, usually one backing struct.
#[derive(Clone)]
pub struct AuthStores {
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub users: Arc<dyn UserDirectory>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl AuthStores {
    pub fn in_memory(store: Arc<InMemoryAuthStore>) -> Self {
        Self {
            api_keys: store.clone(),
            users: store.clone(),
            refresh_tokens: store,
        }
    }
}

#[derive(Clone)]
struct AppState {
    issuer: Arc<TokenIssuer>,
    users: Arc<dyn UserDirectory>,
    refresh: RefreshTokenLifecycle,
}

/// Every role a logged-in user may hold; used by routes open to any user but
/// closed to API keys.
fn any_user_role() -> Vec<Role> {
    ["qoa_admin", "qoa_support", "cpg_admin", "store_admin", "store_staff", "customer", "consumer"]
        .into_iter()
        .map(Role::new)
        .collect()
}

/// Build the full router for the given configuration and stores.
pub fn build_app(config: &AppConfig, stores: AuthStores) -> Router {
    let issuer = Arc::new(TokenIssuer::new(
        &config.jwt_secret,
        config.access_ttl_seconds,
    ));
    let resolver = CredentialResolver::new(
        issuer.clone(),
        stores.api_keys.clone(),
        config.auth_mode,
    );
    let guard = Arc::new(AuthorizationGuard::new(resolver, stores.users.clone()));

    let state = AppState {
        issuer,
        users: stores.users,
        refresh: RefreshTokenLifecycle::new(stores.refresh_tokens, config.refresh_ttl_days),
    };

    let guarded = |requirement: AuthRequirement| {
        middleware::from_fn_with_state(
            GuardState {
                guard: guard.clone(),
                requirement,
            },
            require_auth,
        )
    };

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route(
            "/auth/logout",
            post(logout).route_layer(guarded(AuthRequirement::new().roles(any_user_role()))),
        )
        .route(
            "/users/me",
            get(me).route_layer(guarded(AuthRequirement::new().roles(any_user_role()))),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

fn login_rejected() -> ApiError {
    // One message for unknown email, missing hash, and wrong password.
    let mut err = ApiError::unauthorized();
    err.message = "Invalid credentials".to_string();
    err
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = body.email.trim().to_lowercase();
    let Some(user) = state.users.find_by_email(&email).await? else {
        return Err(login_rejected());
    };
    let Some(password_hash) = user.password_hash.as_deref() else {
        // Accounts provisioned without a password (OTP-only) cannot log in
        // here, and must not be distinguishable from a wrong password.
        return Err(login_rejected());
    };

    if user.is_blocked(Utc::now()) {
        return Err(ApiError::account_blocked());
    }

    match bcrypt::verify(&body.password, password_hash) {
        Ok(true) => {}
        Ok(false) | Err(_) => return Err(login_rejected()),
    }

    let signed = state.issuer.sign(&AccessGrant::new(user.id, user.role.clone()))?;
    let issued = state.refresh.issue(user.id).await?;

    tracing::debug!(user_id = %user.id, "login succeeded");
    Ok(Json(json!({
        "data": {
            "accessToken": signed.token,
            "refreshToken": issued.token,
            "expiresIn": signed.expires_in,
            "user": {
                "id": user.id,
                "email": user.email,
                "phone": user.phone,
                "role": user.role.as_str(),
            },
        }
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Response, ApiError> {
    let Some(rotated) = state.refresh.rotate(&body.refresh_token).await? else {
        return Err(ApiError::session_expired());
    };

    let Some(user) = state.users.find_by_id(rotated.user_id).await? else {
        return Err(ApiError::user_not_found());
    };

    let signed = state.issuer.sign(&AccessGrant::new(user.id, user.role.clone()))?;
    Ok(Json(json!({
        "data": {
            "accessToken": signed.token,
            "refreshToken": rotated.token,
            "expiresIn": signed.expires_in,
        }
    }))
    .into_response())
}

async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Response, ApiError> {
    state.refresh.revoke(&body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn user_body(user: &UserRecord) -> serde_json::Value {
    json!({
        "data": {
            "id": user.id,
            "email": user.email,
            "phone": user.phone,
            "role": user.role.as_str(),
            "status": user.status.as_str(),
            "tenantId": user.tenant_id,
            "tenantType": user.tenant_type.map(|t| t.as_str()),
        }
    })
}

async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    // Role-gated route, so key-bound contexts were already rejected; the
    // user_id is therefore always present.
    let Some(user_id) = ctx.user_id() else {
        return Err(ApiError::forbidden());
    };
    let Some(user) = state.users.find_by_id(user_id).await? else {
        return Err(ApiError::user_not_found());
    };
    Ok(Json(user_body(&user)).into_response())
}
