//! Versioned API endpoints

pub mod keys;

use axum::{
    routing::{get, post},
    Router,
};

use super::auth::create_auth_router;
use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", create_auth_router())
        .route("/keys", get(keys::list_keys).post(keys::create_key))
        .route("/keys/validate", post(keys::validate_key))
        .route(
            "/keys/{key_id}",
            get(keys::get_key).delete(keys::revoke_key),
        )
        .route("/keys/{key_id}/usage", get(keys::get_key_usage))
}
