//! Admin authorization on top of JWT authentication

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::user::User;

use super::user_auth::RequireUser;

/// Extractor that requires an authenticated user with the admin role
///
/// Missing or invalid tokens are rejected with 401, authenticated
/// non-admin users with 403.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            debug!(user_id = %user.id(), "Admin access denied");
            return Err(ApiError::forbidden("Admin access required"));
        }

        Ok(RequireAdmin(user))
    }
}
