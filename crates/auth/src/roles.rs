//! Role model and the fixed role hierarchy.
//!
//! Roles are opaque strings at the type level (tokens may carry anything), but
//! authorization decisions consult a fixed rank table. Unknown roles rank 0,
//! below every known role, so a fabricated role name never gains privilege.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Default role for credentials that carry none.
    pub fn consumer() -> Self {
        Self(Cow::Borrowed("consumer"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// Fixed ranking: higher = more privileged.
const ROLE_HIERARCHY: &[(&str, u8)] = &[
    ("qoa_admin", 100),
    ("qoa_support", 90),
    ("cpg_admin", 50),
    ("store_admin", 40),
    ("store_staff", 30),
    ("customer", 10),
    ("consumer", 1),
];

/// Roles exempt from tenant scoping (full cross-tenant visibility).
pub const GLOBAL_ROLES: &[&str] = &["qoa_admin", "qoa_support"];

/// Roles allowed on the administrative backoffice surface.
pub const BACKOFFICE_ROLES: &[&str] = &["qoa_admin", "qoa_support"];

/// Roles that may read but never mutate.
pub const READ_ONLY_ROLES: &[&str] = &["qoa_support"];

/// Rank of a role in the hierarchy. Unknown roles rank 0.
pub fn rank(role: &Role) -> u8 {
    ROLE_HIERARCHY
        .iter()
        .find(|(name, _)| *name == role.as_str())
        .map(|(_, level)| *level)
        .unwrap_or(0)
}

pub fn is_global(role: &Role) -> bool {
    GLOBAL_ROLES.contains(&role.as_str())
}

pub fn is_backoffice(role: &Role) -> bool {
    BACKOFFICE_ROLES.contains(&role.as_str())
}

pub fn is_read_only(role: &Role) -> bool {
    READ_ONLY_ROLES.contains(&role.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hierarchy_is_strictly_ordered() {
        let ranks: Vec<u8> = ROLE_HIERARCHY.iter().map(|(_, r)| *r).collect();
        for pair in ranks.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn unknown_role_ranks_below_everything() {
        let bogus = Role::new("warehouse_wizard");
        assert_eq!(rank(&bogus), 0);
        assert!(rank(&Role::consumer()) > rank(&bogus));
    }

    #[test]
    fn global_roles_are_known() {
        for name in GLOBAL_ROLES {
            assert!(rank(&Role::new(*name)) > 0);
        }
    }

    #[test]
    fn support_is_read_only_but_global() {
        let support = Role::new("qoa_support");
        assert!(is_global(&support));
        assert!(is_read_only(&support));
        assert!(!is_read_only(&Role::new("qoa_admin")));
    }

    proptest! {
        #[test]
        fn rank_never_exceeds_admin(name in "[a-z_]{0,24}") {
            let role = Role::new(name);
            prop_assert!(rank(&role) <= rank(&Role::new("qoa_admin")));
        }
    }
}
