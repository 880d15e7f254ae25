//! Tenant-scoping policy derived from a resolved credential.
//!
//! - No IO
//! - No panics
//! - No business logic (pure policy checks)

use serde::Serialize;

use qoa_core::{TenantId, TenantType};

use crate::roles::{is_global, is_read_only, rank};
use crate::{AuthContext, Role};

/// Query-scoping filter for tenant-owned resources.
///
/// `None` from [`tenant_filter`] means "no filter" (full visibility), which is
/// only ever true for user-bound global roles and for tenant-less users, whose
/// visibility is limited by identity rather than by tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct TenantFilter {
    pub tenant_id: TenantId,
    pub tenant_type: TenantType,
}

/// Derive the tenant filter for a query issued under `auth`.
pub fn tenant_filter(auth: &AuthContext) -> Option<TenantFilter> {
    match auth {
        // Keys are never global: always scoped to their own tenant.
        AuthContext::Key {
            tenant_id,
            tenant_type,
            ..
        } => Some(TenantFilter {
            tenant_id: *tenant_id,
            tenant_type: *tenant_type,
        }),
        AuthContext::User {
            role,
            tenant_id,
            tenant_type,
            ..
        } => {
            if is_global(role) {
                return None;
            }
            match (tenant_id, tenant_type) {
                (Some(id), Some(ty)) => Some(TenantFilter {
                    tenant_id: *id,
                    tenant_type: *ty,
                }),
                // Consumers have no tenant; they see only their own resources
                // via identity, not via tenant filtering.
                _ => None,
            }
        }
    }
}

/// May `auth` touch a resource owned by the target tenant?
pub fn can_access_tenant(
    auth: &AuthContext,
    target_tenant_id: TenantId,
    target_tenant_type: TenantType,
) -> bool {
    match auth {
        AuthContext::Key {
            tenant_id,
            tenant_type,
            ..
        } => *tenant_id == target_tenant_id && *tenant_type == target_tenant_type,
        AuthContext::User {
            role,
            tenant_id,
            tenant_type,
            ..
        } => {
            if is_global(role) {
                return true;
            }
            *tenant_id == Some(target_tenant_id) && *tenant_type == Some(target_tenant_type)
        }
    }
}

/// True when the caller's role sees every tenant. Keys never do.
pub fn has_global_access(auth: &AuthContext) -> bool {
    match auth {
        AuthContext::Key { .. } => false,
        AuthContext::User { role, .. } => is_global(role),
    }
}

/// True unless the caller holds a read-only role.
///
/// Key-bound callers are always considered capable of mutation; their limits
/// are expressed through scopes, not roles.
pub fn can_modify(auth: &AuthContext) -> bool {
    match auth {
        AuthContext::Key { .. } => true,
        AuthContext::User { role, .. } => !is_read_only(role),
    }
}

/// Role floor check. Key-bound contexts never satisfy a role floor.
pub fn has_minimum_role(auth: &AuthContext, minimum: &Role) -> bool {
    match auth {
        AuthContext::Key { .. } => false,
        AuthContext::User { role, .. } => rank(role) >= rank(minimum),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use qoa_core::{ApiKeyId, UserId};

    use super::*;
    use crate::{KeyAuthKind, UserAuthKind};

    fn user(role: &str, tenant: Option<(TenantId, TenantType)>) -> AuthContext {
        AuthContext::User {
            kind: UserAuthKind::Jwt,
            user_id: UserId::new(),
            role: Role::new(role.to_string()),
            scopes: BTreeSet::new(),
            tenant_id: tenant.map(|(id, _)| id),
            tenant_type: tenant.map(|(_, ty)| ty),
        }
    }

    fn key(tenant_id: TenantId, tenant_type: TenantType) -> AuthContext {
        AuthContext::Key {
            kind: KeyAuthKind::ApiKey,
            api_key_id: ApiKeyId::new(),
            scopes: BTreeSet::new(),
            tenant_id,
            tenant_type,
        }
    }

    #[test]
    fn keys_always_filter_to_their_own_tenant() {
        let tenant = TenantId::new();
        let filter = tenant_filter(&key(tenant, TenantType::Cpg)).unwrap();
        assert_eq!(filter.tenant_id, tenant);
        assert_eq!(filter.tenant_type, TenantType::Cpg);
    }

    #[test]
    fn global_roles_have_no_filter_even_with_a_tenant() {
        let tenant = TenantId::new();
        let ctx = user("qoa_admin", Some((tenant, TenantType::Store)));
        assert_eq!(tenant_filter(&ctx), None);
        assert!(has_global_access(&ctx));
    }

    #[test]
    fn tenant_users_filter_to_their_tenant() {
        let tenant = TenantId::new();
        let ctx = user("store_admin", Some((tenant, TenantType::Store)));
        let filter = tenant_filter(&ctx).unwrap();
        assert_eq!(filter.tenant_id, tenant);
    }

    #[test]
    fn tenantless_consumer_has_no_filter_and_no_global_access() {
        let ctx = user("consumer", None);
        assert_eq!(tenant_filter(&ctx), None);
        assert!(!has_global_access(&ctx));
    }

    #[test]
    fn cross_tenant_access_denied_for_keys_and_scoped_users() {
        let own = TenantId::new();
        let other = TenantId::new();

        let k = key(own, TenantType::Store);
        assert!(can_access_tenant(&k, own, TenantType::Store));
        assert!(!can_access_tenant(&k, other, TenantType::Store));
        assert!(!can_access_tenant(&k, own, TenantType::Cpg));

        let u = user("cpg_admin", Some((own, TenantType::Cpg)));
        assert!(can_access_tenant(&u, own, TenantType::Cpg));
        assert!(!can_access_tenant(&u, other, TenantType::Cpg));

        let admin = user("qoa_admin", None);
        assert!(can_access_tenant(&admin, other, TenantType::Store));
    }

    #[test]
    fn read_only_roles_cannot_modify() {
        assert!(!can_modify(&user("qoa_support", None)));
        assert!(can_modify(&user("qoa_admin", None)));
        assert!(can_modify(&key(TenantId::new(), TenantType::Cpg)));
    }

    #[test]
    fn minimum_role_never_satisfied_by_keys() {
        let k = key(TenantId::new(), TenantType::Store);
        assert!(!has_minimum_role(&k, &Role::consumer()));

        let staff = user("store_staff", None);
        assert!(has_minimum_role(&staff, &Role::new("customer")));
        assert!(!has_minimum_role(&staff, &Role::new("store_admin")));
        assert!(has_minimum_role(&staff, &Role::new("store_staff")));
    }

    proptest! {
        // Key-bound contexts must never escape tenant scoping, whatever their
        // scopes say.
        #[test]
        fn key_filter_is_never_none(scope in "[a-z:*]{0,12}") {
            let mut scopes = BTreeSet::new();
            scopes.insert(scope);
            let ctx = AuthContext::Key {
                kind: KeyAuthKind::ApiKey,
                api_key_id: ApiKeyId::new(),
                scopes,
                tenant_id: TenantId::new(),
                tenant_type: TenantType::Store,
            };
            prop_assert!(tenant_filter(&ctx).is_some());
            prop_assert!(!has_global_access(&ctx));
        }

        #[test]
        fn global_user_filter_is_always_none(has_tenant in any::<bool>()) {
            let tenant = has_tenant.then(|| (TenantId::new(), TenantType::Cpg));
            let ctx = user("qoa_support", tenant);
            prop_assert!(tenant_filter(&ctx).is_none());
        }
    }
}
