//! `qoa-auth` — pure authentication/authorization domain (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: it models the
//! credential kinds, the fixed role hierarchy, tenant-scoping policy, and the
//! signed access-token boundary. Resolution against live requests and stores
//! lives in `qoa-api` / `qoa-infra`.

pub mod context;
pub mod policy;
pub mod roles;
pub mod token;

pub use context::{AuthContext, AuthRequirement, KeyAuthKind, UserAuthKind};
pub use policy::{
    can_access_tenant, can_modify, has_global_access, has_minimum_role, tenant_filter,
    TenantFilter,
};
pub use roles::{rank, Role};
pub use token::{
    AccessClaims, AccessGrant, InvalidToken, SignedAccessToken, SigningError, TokenIssuer,
    DEFAULT_ACCESS_TTL_SECONDS,
};
