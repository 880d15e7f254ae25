//! Process configuration.
//!
//! All environment reads happen once, in `main`; everything else receives
//! explicit values. In particular the dev-auth switch is a constructor
//! argument, not a scattered env read, so both states are testable without
//! process-global mutation.

use qoa_auth::DEFAULT_ACCESS_TTL_SECONDS;
use qoa_infra::DEFAULT_REFRESH_TTL_DAYS;

/// Where and whether developer-override credentials are honored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AuthMode {
    /// Explicit opt-in flag for the dev-header override path.
    pub dev_auth_enabled: bool,
    /// Hard kill switch: in production the override path is unreachable
    /// regardless of the flag or any header content.
    pub production: bool,
}

impl AuthMode {
    pub fn production() -> Self {
        Self {
            dev_auth_enabled: false,
            production: true,
        }
    }

    pub fn development(dev_auth_enabled: bool) -> Self {
        Self {
            dev_auth_enabled,
            production: false,
        }
    }

    /// The override path is active only outside production, behind the flag.
    pub fn dev_override_active(&self) -> bool {
        self.dev_auth_enabled && !self.production
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_days: i64,
    pub auth_mode: AuthMode,
}

impl AppConfig {
    pub fn new(jwt_secret: impl Into<String>, auth_mode: AuthMode) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            auth_mode,
        }
    }
}
