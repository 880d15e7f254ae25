//! Resolved credential context and per-route requirements.

use std::collections::BTreeSet;

use qoa_core::{ApiKeyId, TenantId, TenantType, UserId};

use crate::Role;

/// How a user-bound credential was presented.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserAuthKind {
    /// Signed access token.
    Jwt,
    /// Developer-override headers (never active in production).
    Dev,
}

/// How a key-bound credential was presented.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyAuthKind {
    /// Hashed lookup of a provisioned API key.
    ApiKey,
    /// Developer-override headers (never active in production).
    DevApiKey,
}

/// The single authenticated identity attached to a request.
///
/// A closed sum over the two credential families. Key-bound credentials always
/// carry a concrete tenant; user-bound ones may have none (consumers). After
/// resolution the variant is immutable, except that the authorization guard
/// overwrites the user-bound tenant fields from the user row — the row, not
/// the token claims, is the source of truth for tenant identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    User {
        kind: UserAuthKind,
        user_id: UserId,
        role: Role,
        scopes: BTreeSet<String>,
        tenant_id: Option<TenantId>,
        tenant_type: Option<TenantType>,
    },
    Key {
        kind: KeyAuthKind,
        api_key_id: ApiKeyId,
        scopes: BTreeSet<String>,
        tenant_id: TenantId,
        tenant_type: TenantType,
    },
}

impl AuthContext {
    pub fn is_user_bound(&self) -> bool {
        matches!(self, AuthContext::User { .. })
    }

    pub fn is_key_bound(&self) -> bool {
        matches!(self, AuthContext::Key { .. })
    }

    /// Identity of the backing user, when user-bound.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            AuthContext::Key { .. } => None,
        }
    }

    /// Role of the caller, when user-bound. Keys have no role by design.
    pub fn role(&self) -> Option<&Role> {
        match self {
            AuthContext::User { role, .. } => Some(role),
            AuthContext::Key { .. } => None,
        }
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        match self {
            AuthContext::User { scopes, .. } | AuthContext::Key { scopes, .. } => scopes,
        }
    }

    /// Every required scope must be present; exact string match, no wildcards.
    pub fn has_scopes<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> bool {
        let scopes = self.scopes();
        required.into_iter().all(|scope| scopes.contains(scope))
    }

    /// Overwrite the tenant fields from the backing user row.
    ///
    /// Only meaningful for user-bound contexts; key-bound tenants come from
    /// the key row at resolution time and are never rewritten.
    pub fn set_user_tenant(
        &mut self,
        new_tenant_id: Option<TenantId>,
        new_tenant_type: Option<TenantType>,
    ) {
        if let AuthContext::User {
            tenant_id,
            tenant_type,
            ..
        } = self
        {
            *tenant_id = new_tenant_id;
            *tenant_type = new_tenant_type;
        }
    }
}

/// Declared authorization requirement for a route.
///
/// Empty role/scope lists mean "no constraint of that kind". `allow_api_key`
/// widens credential resolution: a bearer token carrying the reserved key
/// prefix is only tried as an API key when this is set (or when no bearer
/// token is present at all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequirement {
    pub roles: Vec<Role>,
    pub scopes: Vec<String>,
    pub allow_api_key: bool,
}

impl AuthRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_api_key(mut self) -> Self {
        self.allow_api_key = true;
        self
    }

    pub fn allows_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|allowed| allowed == role)
    }
}
