//! Authentication API endpoints
//!
//! Login, registration and current-user lookups for JWT-based operator access.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::api::middleware::{RequireAdmin, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::user::{User, UserRole};

/// Create the authentication router
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(get_current_user))
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: String,
}

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// User response (safe to expose)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            username: user.username().to_string(),
            role: user.role().to_string(),
            created_at: user.created_at().to_rfc3339(),
            last_login_at: user.last_login_at().map(|t| t.to_rfc3339()),
        }
    }
}

/// Login with username and password
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(&request.username, &request.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let token = state.jwt_service.generate(&user)?;

    let hours = i64::try_from(state.jwt_service.expiration_hours()).unwrap_or(i64::MAX);
    let expires_at = Duration::try_hours(hours)
        .and_then(|ttl| state.clock.now().checked_add_signed(ttl))
        .ok_or_else(|| ApiError::internal("Token lifetime out of range"))?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from_user(&user),
        expires_at: expires_at.to_rfc3339(),
    }))
}

/// Register a new user
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let role = match request.role.as_deref() {
        None => UserRole::default(),
        Some(raw) => raw
            .parse::<UserRole>()
            .map_err(|_| ApiError::bad_request(format!("Unknown role '{}'", raw)).with_param("role"))?,
    };

    let user = state
        .user_service
        .register(&request.username, &request.password, role)
        .await?;

    tracing::info!(
        admin_id = %admin.id(),
        user_id = %user.id(),
        "User registered by admin"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Get current authenticated user
///
/// GET /api/v1/auth/me
pub async fn get_current_user(
    RequireUser(user): RequireUser,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(UserResponse::from_user(&user)))
}
