//! Tenant classification.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The two kinds of tenant that can own resources.
///
/// A `cpg` tenant is a consumer-packaged-goods brand; a `store` tenant is a
/// retail location. Every API key belongs to exactly one tenant of one of
/// these types; users may belong to one or to none (consumers).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantType {
    Cpg,
    Store,
}

impl TenantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantType::Cpg => "cpg",
            TenantType::Store => "store",
        }
    }

    /// Lenient parse: anything other than exactly `cpg` or `store` is `None`.
    ///
    /// Untrusted inputs (token claims, dev headers) use this instead of
    /// `FromStr` so an unknown value degrades to "no tenant type" rather than
    /// failing the whole credential.
    pub fn parse_opt(value: &str) -> Option<Self> {
        match value {
            "cpg" => Some(TenantType::Cpg),
            "store" => Some(TenantType::Store),
            _ => None,
        }
    }
}

impl core::fmt::Display for TenantType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_opt(s)
            .ok_or_else(|| DomainError::validation(format!("unknown tenant type: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_opt_accepts_only_known_values() {
        assert_eq!(TenantType::parse_opt("cpg"), Some(TenantType::Cpg));
        assert_eq!(TenantType::parse_opt("store"), Some(TenantType::Store));
        assert_eq!(TenantType::parse_opt("Store"), None);
        assert_eq!(TenantType::parse_opt(""), None);
        assert_eq!(TenantType::parse_opt("warehouse"), None);
    }

    #[test]
    fn serde_round_trip_is_snake_case() {
        let json = serde_json::to_string(&TenantType::Cpg).unwrap();
        assert_eq!(json, "\"cpg\"");
        let back: TenantType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TenantType::Cpg);
    }
}
