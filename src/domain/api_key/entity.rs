//! API key entity and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::KeyValidationError;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Default number of items per page when the caller gives none or an invalid one
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// API key identifier, assigned at issuance and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    /// Create a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for KeyId {
    type Err = KeyValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| KeyValidationError::InvalidId(s.to_string()))
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How many times a key may be used
///
/// This is the explicit issuance input. `Limited(0)` is a legitimate value
/// and yields a key that is exhausted from birth; callers that carry a bare
/// integer should go through [`UsageLimit::from_max_uses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLimit {
    Unlimited,
    Limited(u32),
}

impl UsageLimit {
    /// Stored `max_uses` value meaning "no ceiling"
    pub const UNLIMITED_SENTINEL: i64 = -1;

    /// Map a wire-level `max_uses` integer
    ///
    /// `0` and negative values mean unlimited. An omitted field and an
    /// explicit zero are therefore indistinguishable on this path. Ceilings
    /// above `u32::MAX` are rejected.
    pub fn from_max_uses(max_uses: i64) -> Result<Self, DomainError> {
        if max_uses <= 0 {
            return Ok(Self::Unlimited);
        }

        u32::try_from(max_uses).map(Self::Limited).map_err(|_| {
            DomainError::validation(format!(
                "max_uses must not exceed {}, got {}",
                u32::MAX,
                max_uses
            ))
        })
    }

    /// Map a persisted `max_uses` column, where only negatives mean unlimited
    pub fn from_stored(max_uses: i64) -> Self {
        if max_uses < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(max_uses).unwrap_or(u32::MAX))
        }
    }

    pub fn as_max_uses(&self) -> i64 {
        match self {
            Self::Unlimited => Self::UNLIMITED_SENTINEL,
            Self::Limited(n) => i64::from(*n),
        }
    }
}

/// Whether a key may be used right now
///
/// Derived from the record's fields at check time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usability {
    Usable,
    Revoked,
    Expired,
    Exhausted,
}

impl Usability {
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Usable)
    }

    /// Map a blocking state onto the error reported to callers
    pub fn into_result(self) -> Result<(), DomainError> {
        match self {
            Self::Usable => Ok(()),
            Self::Revoked => Err(DomainError::Revoked),
            Self::Expired => Err(DomainError::Expired),
            Self::Exhausted => Err(DomainError::UsageLimitExceeded),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usable => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::Exhausted => "exhausted",
        }
    }
}

/// API key entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    id: KeyId,
    /// The secret token presented by callers
    #[serde(skip_serializing)]
    value: String,
    label: String,
    /// `-1` means unlimited
    max_uses: i64,
    used_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_user_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Create a new, unused and unrevoked key
    pub fn new(
        value: impl Into<String>,
        label: impl Into<String>,
        usage_limit: UsageLimit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: KeyId::new(),
            value: value.into(),
            label: label.into(),
            max_uses: usage_limit.as_max_uses(),
            used_count: 0,
            expires_at: None,
            revoked: false,
            owner_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from persisted columns
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: KeyId,
        value: String,
        label: String,
        max_uses: i64,
        used_count: i64,
        expires_at: Option<DateTime<Utc>>,
        revoked: bool,
        owner_user_id: Option<UserId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            value,
            label,
            max_uses,
            used_count,
            expires_at,
            revoked,
            owner_user_id,
            created_at,
            updated_at,
        }
    }

    /// Set expiration
    pub fn with_expiration(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Set owning user
    pub fn with_owner(mut self, owner: Option<UserId>) -> Self {
        self.owner_user_id = owner;
        self
    }

    // Getters

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_uses(&self) -> i64 {
        self.max_uses
    }

    pub fn usage_limit(&self) -> UsageLimit {
        UsageLimit::from_stored(self.max_uses)
    }

    pub fn used_count(&self) -> i64 {
        self.used_count
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn owner_user_id(&self) -> Option<&UserId> {
        self.owner_user_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Remaining uses, `None` when unlimited
    pub fn remaining_uses(&self) -> Option<i64> {
        if self.max_uses < 0 {
            None
        } else {
            Some((self.max_uses - self.used_count).max(0))
        }
    }

    // Status checks

    /// Evaluate usability at `now`
    ///
    /// Precedence is fixed: revoked, then expired, then exhausted.
    pub fn usability(&self, now: DateTime<Utc>) -> Usability {
        if self.revoked {
            return Usability::Revoked;
        }

        if self.expires_at.is_some_and(|expires_at| now >= expires_at) {
            return Usability::Expired;
        }

        if self.max_uses >= 0 && self.used_count >= self.max_uses {
            return Usability::Exhausted;
        }

        Usability::Usable
    }

    // Mutators

    /// Consume one use; callers must have checked usability under the same lock
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.used_count += 1;
        self.updated_at = now;
    }

    /// Revoke the key, returning false when it was already revoked
    pub fn revoke(&mut self, now: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }

        self.revoked = true;
        self.updated_at = now;
        true
    }
}

/// Append-only record of one successful validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub key_id: KeyId,
    pub caller_identity: String,
    pub used_at: DateTime<Utc>,
}

impl UsageLogEntry {
    pub fn new(key_id: KeyId, caller_identity: impl Into<String>, used_at: DateTime<Utc>) -> Self {
        Self {
            key_id,
            caller_identity: caller_identity.into(),
            used_at,
        }
    }
}

/// Normalized pagination input
///
/// Out-of-range input is corrected, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = if page < 1 {
            1
        } else {
            u32::try_from(page).unwrap_or(u32::MAX)
        };

        let page_size = if (1..=i64::from(MAX_PAGE_SIZE)).contains(&page_size) {
            page_size as u32
        } else {
            DEFAULT_PAGE_SIZE
        };

        Self { page, page_size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items preceding this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, i64::from(DEFAULT_PAGE_SIZE))
    }
}

/// One page of keys plus the totals needed to navigate
#[derive(Debug, Clone)]
pub struct KeyPage {
    pub items: Vec<KeyRecord>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub pages: u32,
}

impl KeyPage {
    pub fn new(items: Vec<KeyRecord>, total: u64, request: &PageRequest) -> Self {
        let size = u64::from(request.page_size());
        let pages = total.div_ceil(size).max(1);

        Self {
            items,
            total,
            page: request.page(),
            page_size: request.page_size(),
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }
}
