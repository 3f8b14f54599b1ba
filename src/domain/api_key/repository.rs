//! API key store contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::{KeyId, KeyRecord, PageRequest, Usability, UsageLogEntry};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Outcome of a conditional use increment
#[derive(Debug, Clone)]
pub enum UseIncrement {
    /// The key was usable and one use was consumed; carries the updated record
    Consumed(KeyRecord),
    /// The key was not usable at the store's linearization point
    Rejected(Usability),
}

/// Store of record for API keys and their usage log
///
/// Implementations are the linearization point for mutations: the usability
/// re-check and the increment in `increment_uses`, and the flag flip in
/// `revoke`, must each happen atomically with respect to concurrent calls on
/// the same key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyStore: Send + Sync + Debug {
    /// Look up a key by its secret value
    async fn find_by_value(&self, value: &str) -> Result<Option<KeyRecord>, DomainError>;

    /// Look up a key by ID
    async fn find_by_id(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError>;

    /// Persist a freshly issued key
    async fn create(&self, record: KeyRecord) -> Result<KeyRecord, DomainError>;

    /// Consume one use if the key is usable at `now`
    ///
    /// Fails with `NotFound` when no key has this ID.
    async fn increment_uses(
        &self,
        id: &KeyId,
        now: DateTime<Utc>,
    ) -> Result<UseIncrement, DomainError>;

    /// Flip the revoked flag, returning false when it was already set
    ///
    /// Fails with `NotFound` when no key has this ID.
    async fn revoke(&self, id: &KeyId, now: DateTime<Utc>) -> Result<bool, DomainError>;

    /// One page of keys, newest first, plus the total key count
    async fn find_all(&self, page: &PageRequest) -> Result<(Vec<KeyRecord>, u64), DomainError>;

    /// Append a usage record
    async fn log_usage(&self, entry: &UsageLogEntry) -> Result<(), DomainError>;

    /// Usage records for one key, oldest first
    async fn usage_for(&self, id: &KeyId) -> Result<Vec<UsageLogEntry>, DomainError>;
}
