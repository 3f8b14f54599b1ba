//! API key issuance, inspection, revocation and validation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::{ClientIdentity, RequireAdmin};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::api_key::{KeyId, KeyPage, KeyRecord, PageRequest, UsageLimit, UsageLogEntry};
use crate::domain::user::UserId;
use crate::infrastructure::api_key::IssueKeyRequest;

/// Request to issue a new key
#[derive(Debug, Clone, Deserialize)]
pub struct CreateKeyRequest {
    pub label: String,
    /// Absent, zero or negative means unlimited
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Request to validate a presented key
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateKeyRequest {
    pub key: String,
}

/// Pagination query, kept as raw strings so bad input is normalized rather than rejected
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListKeysQuery {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl ListKeysQuery {
    pub fn to_page_request(&self) -> PageRequest {
        PageRequest::new(parse_or_zero(&self.page), parse_or_zero(&self.size))
    }
}

fn parse_or_zero(raw: &Option<String>) -> i64 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Key metadata, never including the secret value
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    pub id: String,
    pub label: String,
    /// `None` when unlimited
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub remaining_uses: Option<i64>,
    pub expires_at: Option<String>,
    pub revoked: bool,
    pub status: String,
    pub owner_user_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl KeyResponse {
    pub fn from_record(record: &KeyRecord, now: DateTime<Utc>) -> Self {
        let max_uses = match record.usage_limit() {
            UsageLimit::Unlimited => None,
            UsageLimit::Limited(n) => Some(i64::from(n)),
        };

        Self {
            id: record.id().to_string(),
            label: record.label().to_string(),
            max_uses,
            used_count: record.used_count(),
            remaining_uses: record.remaining_uses(),
            expires_at: record.expires_at().map(|dt| dt.to_rfc3339()),
            revoked: record.is_revoked(),
            status: record.usability(now).as_str().to_string(),
            owner_user_id: record.owner_user_id().map(|id| id.to_string()),
            created_at: record.created_at().to_rfc3339(),
            updated_at: record.updated_at().to_rfc3339(),
        }
    }
}

/// Key response with the secret value (only on issuance)
#[derive(Debug, Clone, Serialize)]
pub struct KeyWithValueResponse {
    #[serde(flatten)]
    pub key: KeyResponse,
    pub value: String,
}

/// One page of keys
#[derive(Debug, Clone, Serialize)]
pub struct ListKeysResponse {
    pub items: Vec<KeyResponse>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub pages: u32,
}

impl ListKeysResponse {
    fn from_page(page: KeyPage, now: DateTime<Utc>) -> Self {
        Self {
            items: page
                .items
                .iter()
                .map(|record| KeyResponse::from_record(record, now))
                .collect(),
            total: page.total,
            page: page.page,
            size: page.page_size,
            pages: page.pages,
        }
    }
}

/// Outcome of a successful validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidateKeyResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub key: KeyResponse,
    pub used_at: String,
}

/// Usage log entry
#[derive(Debug, Clone, Serialize)]
pub struct UsageEntryResponse {
    pub caller_identity: String,
    pub used_at: String,
}

impl From<&UsageLogEntry> for UsageEntryResponse {
    fn from(entry: &UsageLogEntry) -> Self {
        Self {
            caller_identity: entry.caller_identity.clone(),
            used_at: entry.used_at.to_rfc3339(),
        }
    }
}

fn parse_key_id(raw: &str) -> Result<KeyId, ApiError> {
    raw.parse::<KeyId>()
        .map_err(|e| ApiError::bad_request(e.to_string()).with_param("id"))
}

/// POST /api/v1/keys
pub async fn create_key(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<KeyWithValueResponse>), ApiError> {
    debug!(admin_id = %admin.id(), "Admin issuing API key");

    let owner = request
        .user_id
        .as_deref()
        .map(|raw| {
            raw.parse::<UserId>()
                .map_err(|e| ApiError::bad_request(e.to_string()).with_param("user_id"))
        })
        .transpose()?;

    let usage_limit = UsageLimit::from_max_uses(request.max_uses.unwrap_or(0))
        .map_err(|e| ApiError::from(e).with_param("max_uses"))?;

    let issue = IssueKeyRequest::new(request.label, usage_limit)
        .with_expiration(request.expires_at)
        .with_owner(owner);

    let record = state.key_service.issue(issue).await?;

    Ok((
        StatusCode::CREATED,
        Json(KeyWithValueResponse {
            key: KeyResponse::from_record(&record, state.clock.now()),
            value: record.value().to_string(),
        }),
    ))
}

/// GET /api/v1/keys
pub async fn list_keys(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let page = state.key_service.list(&query.to_page_request()).await?;

    Ok(Json(ListKeysResponse::from_page(page, state.clock.now())))
}

/// GET /api/v1/keys/{key_id}
pub async fn get_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<KeyResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let record = state.key_service.get(&id).await?;

    Ok(Json(KeyResponse::from_record(&record, state.clock.now())))
}

/// DELETE /api/v1/keys/{key_id}
pub async fn revoke_key(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<KeyResponse>, ApiError> {
    debug!(admin_id = %admin.id(), key_id = %key_id, "Admin revoking API key");

    let id = parse_key_id(&key_id)?;
    let record = state.key_service.revoke(&id).await?;

    Ok(Json(KeyResponse::from_record(&record, state.clock.now())))
}

/// GET /api/v1/keys/{key_id}/usage
pub async fn get_key_usage(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<Vec<UsageEntryResponse>>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let entries = state.key_service.usage(&id).await?;

    Ok(Json(entries.iter().map(UsageEntryResponse::from).collect()))
}

/// POST /api/v1/keys/validate
///
/// Public: the key itself is the credential. Every attempt counts against
/// the caller's rate limit.
pub async fn validate_key(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Json(request): Json<ValidateKeyRequest>,
) -> Result<Json<ValidateKeyResponse>, ApiError> {
    let validated = state
        .admission
        .admit(&request.key, identity.as_str())
        .await?;

    Ok(Json(ValidateKeyResponse {
        valid: true,
        key: KeyResponse::from_record(&validated.record, validated.usage.used_at),
        used_at: validated.usage.used_at.to_rfc3339(),
    }))
}
