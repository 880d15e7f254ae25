//! Infrastructure layer: credential persistence and refresh-token lifecycle.
//!
//! Everything here is behind object-safe async traits so the HTTP layer can be
//! wired against Postgres in production and the in-memory store in tests.

pub mod crypto;
pub mod error;
pub mod refresh;
pub mod store;

pub use crypto::{generate_opaque_token, hash_credential};
pub use error::{StoreError, StoreResult};
pub use refresh::{
    IssuedRefreshToken, RefreshTokenLifecycle, RotatedRefreshToken, DEFAULT_REFRESH_TTL_DAYS,
};
pub use store::in_memory::InMemoryAuthStore;
pub use store::postgres::PgAuthStore;
pub use store::{
    ApiKeyRecord, ApiKeyStore, RefreshSessionRecord, RefreshTokenStore, UserDirectory,
    UserRecord, UserStatus,
};
