//! API key lifecycle service
//!
//! Issues, validates and revokes keys on top of a [`KeyStore`]. The store is
//! the linearization point for every mutation; this service never holds a
//! lock across a store round-trip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::api_key::{
    validate_label, is_well_formed_value, KeyId, KeyPage, KeyRecord, KeyStore, PageRequest,
    UseIncrement, UsageLimit, UsageLogEntry,
};
use crate::domain::user::{UserId, UserRepository};
use crate::domain::{Clock, DomainError};

use super::generator::KeyValueGenerator;

/// Input for issuing a new key
#[derive(Debug, Clone)]
pub struct IssueKeyRequest {
    pub label: String,
    pub usage_limit: UsageLimit,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_user_id: Option<UserId>,
}

impl IssueKeyRequest {
    pub fn new(label: impl Into<String>, usage_limit: UsageLimit) -> Self {
        Self {
            label: label.into(),
            usage_limit,
            expires_at: None,
            owner_user_id: None,
        }
    }

    pub fn with_expiration(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_owner(mut self, owner: Option<UserId>) -> Self {
        self.owner_user_id = owner;
        self
    }
}

/// Result of a successful validation
#[derive(Debug, Clone)]
pub struct ValidatedKey {
    /// The key after its use was consumed
    pub record: KeyRecord,
    pub usage: UsageLogEntry,
}

/// API key service
#[derive(Debug, Clone)]
pub struct ApiKeyService {
    store: Arc<dyn KeyStore>,
    generator: KeyValueGenerator,
    clock: Arc<dyn Clock>,
    /// Owner lookup for issuance; without it owners are taken on trust
    users: Option<Arc<dyn UserRepository>>,
}

impl ApiKeyService {
    /// Create a new API key service
    pub fn new(store: Arc<dyn KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            generator: KeyValueGenerator::new(),
            clock,
            users: None,
        }
    }

    /// Check key owners against a user store at issuance
    pub fn with_users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    /// Create with a custom generator
    pub fn with_generator(mut self, generator: KeyValueGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Issue a new API key
    ///
    /// An expiry in the past is accepted; the key is simply expired from birth.
    /// An owner that does not exist is a validation error.
    pub async fn issue(&self, request: IssueKeyRequest) -> Result<KeyRecord, DomainError> {
        let label = request.label.trim();
        validate_label(label).map_err(|e| DomainError::validation(e.to_string()))?;

        if let Some(owner) = &request.owner_user_id {
            self.ensure_owner_exists(owner).await?;
        }

        let value = self.generator.generate()?;

        let record = KeyRecord::new(value, label, request.usage_limit, self.clock.now())
            .with_expiration(request.expires_at)
            .with_owner(request.owner_user_id);

        let created = self.store.create(record).await?;

        info!(
            key_id = %created.id(),
            max_uses = created.max_uses(),
            "API key issued"
        );

        Ok(created)
    }

    async fn ensure_owner_exists(&self, owner: &UserId) -> Result<(), DomainError> {
        let Some(users) = &self.users else {
            return Ok(());
        };

        if users.get(owner).await?.is_none() {
            debug!(owner_user_id = %owner, "Rejected key for unknown owner");
            return Err(DomainError::validation(format!(
                "Owner user '{}' does not exist",
                owner
            )));
        }

        Ok(())
    }

    /// Validate a presented key value and consume one use
    pub async fn validate(
        &self,
        value: &str,
        caller_identity: &str,
    ) -> Result<ValidatedKey, DomainError> {
        if !is_well_formed_value(value) {
            debug!("Rejected malformed API key value");
            return Err(DomainError::not_found("API key not found"));
        }

        let key = self
            .store
            .find_by_value(value)
            .await?
            .ok_or_else(|| DomainError::not_found("API key not found"))?;

        let now = self.clock.now();

        let usability = key.usability(now);
        if !usability.is_usable() {
            debug!(key_id = %key.id(), status = usability.as_str(), "API key not usable");
            usability.into_result()?;
        }

        let record = match self.store.increment_uses(key.id(), now).await? {
            UseIncrement::Consumed(record) => record,
            UseIncrement::Rejected(usability) => {
                debug!(
                    key_id = %key.id(),
                    status = usability.as_str(),
                    "API key use rejected by store"
                );
                usability.into_result()?;
                return Err(DomainError::internal(
                    "Store rejected a use without a blocking state",
                ));
            }
        };

        let usage = UsageLogEntry::new(*record.id(), caller_identity, now);

        if let Err(e) = self.store.log_usage(&usage).await {
            warn!(key_id = %record.id(), error = %e, "Failed to record API key usage");
        }

        Ok(ValidatedKey { record, usage })
    }

    /// Revoke an API key
    pub async fn revoke(&self, id: &KeyId) -> Result<KeyRecord, DomainError> {
        let mut key = self.get(id).await?;

        if key.is_revoked() {
            return Err(DomainError::AlreadyRevoked);
        }

        let now = self.clock.now();

        if !self.store.revoke(id, now).await? {
            return Err(DomainError::AlreadyRevoked);
        }

        key.revoke(now);
        info!(key_id = %id, "API key revoked");

        Ok(key)
    }

    /// Get an API key by ID
    pub async fn get(&self, id: &KeyId) -> Result<KeyRecord, DomainError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }

    /// List API keys, newest first
    pub async fn list(&self, page: &PageRequest) -> Result<KeyPage, DomainError> {
        let (items, total) = self.store.find_all(page).await?;
        Ok(KeyPage::new(items, total, page))
    }

    /// Usage records for a key, oldest first
    pub async fn usage(&self, id: &KeyId) -> Result<Vec<UsageLogEntry>, DomainError> {
        self.get(id).await?;
        self.store.usage_for(id).await
    }

    /// Current time according to the service clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
