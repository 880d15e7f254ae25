use std::sync::Arc;

use qoa_api::app::{build_app, AuthStores};
use qoa_api::{AppConfig, AuthMode};
use qoa_infra::{InMemoryAuthStore, PgAuthStore};

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    qoa_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let production = std::env::var("APP_ENV").as_deref() == Ok("production");
    let auth_mode = if production {
        AuthMode::production()
    } else {
        AuthMode::development(env_flag("AUTH_DEV_MODE"))
    };

    let mut config = AppConfig::new(jwt_secret, auth_mode);
    config.access_ttl_seconds = env_i64("AUTH_ACCESS_TTL_SECONDS", config.access_ttl_seconds);
    config.refresh_ttl_days = env_i64("AUTH_REFRESH_TTL_DAYS", config.refresh_ttl_days);

    let stores = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to DATABASE_URL");
            let store = Arc::new(PgAuthStore::new(pool));
            AuthStores {
                api_keys: store.clone(),
                users: store.clone(),
                refresh_tokens: store,
            }
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using volatile in-memory stores");
            AuthStores::in_memory(Arc::new(InMemoryAuthStore::new()))
        }
    };

    let app = build_app(&config, stores);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
