//! Keygen Service
//!
//! Issues, validates and revokes API keys with:
//! - Per-key usage limits and expiration
//! - Atomic use consumption under concurrent validation
//! - Per-caller sliding window rate limiting on the public validation path
//! - In-memory or PostgreSQL persistence

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::{Clock, DomainError, SystemClock};
use infrastructure::{
    api_key::{ApiKeyService, SlidingWindowLimiter},
    auth::{JwtConfig, JwtService},
    storage::Stores,
    user::{Argon2Hasher, PasswordHasher, UserService},
};
use tracing::info;

/// Create the application state for the configured backend
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let stores = Stores::from_config(&config.storage).await?;
    let state = build_state(
        config,
        stores,
        Arc::new(SystemClock),
        Arc::new(Argon2Hasher::new()),
    )
    .await?;

    Ok(state)
}

/// Wire services over already-built stores and create the bootstrap admin
pub async fn build_state(
    config: &AppConfig,
    stores: Stores,
    clock: Arc<dyn Clock>,
    hasher: Arc<dyn PasswordHasher>,
) -> Result<AppState, DomainError> {
    let jwt_service = Arc::new(JwtService::new(JwtConfig::new(
        config.auth.jwt_secret.clone(),
        config.auth.token_ttl_hours,
    ))?);

    let user_service = Arc::new(UserService::new(stores.users.clone(), hasher));

    if let (Some(username), Some(password)) = (
        config.auth.bootstrap_admin_username.as_deref(),
        config.auth.bootstrap_admin_password.as_deref(),
    ) {
        match user_service.ensure_admin(username, password).await? {
            Some(admin) => info!(user_id = %admin.id(), "Bootstrap admin created"),
            None => info!("Bootstrap admin already present"),
        }
    }

    let key_service =
        Arc::new(ApiKeyService::new(stores.keys, clock.clone()).with_users(stores.users));
    let limiter = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit));

    info!(
        requests_per_window = config.rate_limit.requests_per_window,
        window_secs = config.rate_limit.window_secs,
        trust_forwarded_for = config.rate_limit.trust_forwarded_for,
        "Validation rate limiter configured"
    );

    Ok(
        AppState::new(key_service, limiter, user_service, jwt_service, clock)
            .with_trust_forwarded_for(config.rate_limit.trust_forwarded_for),
    )
}
