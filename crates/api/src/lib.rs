//! HTTP API: server, routing, and the authorization gate.

pub mod app;
pub mod config;
pub mod error;
pub mod guard;
pub mod resolver;

pub use config::{AppConfig, AuthMode};
pub use error::ApiError;
pub use guard::AuthorizationGuard;
pub use resolver::CredentialResolver;
