//! In-memory API key store
//!
//! Every conditional mutation runs under a single write guard, which makes
//! this store its own linearization point. It is only correct when this
//! process exclusively owns the data.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::api_key::{
    KeyId, KeyRecord, KeyStore, PageRequest, UseIncrement, UsageLogEntry,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct KeyTable {
    by_id: HashMap<KeyId, KeyRecord>,
    by_value: HashMap<String, KeyId>,
    /// Insertion order, used for newest-first listing
    order: Vec<KeyId>,
}

/// In-memory implementation of KeyStore
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<KeyTable>>,
    usage: Arc<RwLock<Vec<UsageLogEntry>>>,
}

impl InMemoryKeyStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn find_by_value(&self, value: &str) -> Result<Option<KeyRecord>, DomainError> {
        let keys = self.keys.read().await;

        Ok(keys
            .by_value
            .get(value)
            .and_then(|id| keys.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.by_id.get(id).cloned())
    }

    async fn create(&self, record: KeyRecord) -> Result<KeyRecord, DomainError> {
        let mut keys = self.keys.write().await;

        if keys.by_id.contains_key(record.id()) {
            return Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                record.id()
            )));
        }

        if keys.by_value.contains_key(record.value()) {
            return Err(DomainError::conflict("API key value already exists"));
        }

        let id = *record.id();
        keys.by_value.insert(record.value().to_string(), id);
        keys.by_id.insert(id, record.clone());
        keys.order.push(id);

        Ok(record)
    }

    async fn increment_uses(
        &self,
        id: &KeyId,
        now: DateTime<Utc>,
    ) -> Result<UseIncrement, DomainError> {
        let mut keys = self.keys.write().await;

        let record = keys
            .by_id
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        let usability = record.usability(now);
        if !usability.is_usable() {
            return Ok(UseIncrement::Rejected(usability));
        }

        record.record_use(now);
        Ok(UseIncrement::Consumed(record.clone()))
    }

    async fn revoke(&self, id: &KeyId, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let mut keys = self.keys.write().await;

        let record = keys
            .by_id
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        Ok(record.revoke(now))
    }

    async fn find_all(&self, page: &PageRequest) -> Result<(Vec<KeyRecord>, u64), DomainError> {
        let keys = self.keys.read().await;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);

        let items = keys
            .order
            .iter()
            .rev()
            .skip(offset)
            .take(page.page_size() as usize)
            .filter_map(|id| keys.by_id.get(id).cloned())
            .collect();

        Ok((items, keys.order.len() as u64))
    }

    async fn log_usage(&self, entry: &UsageLogEntry) -> Result<(), DomainError> {
        self.usage.write().await.push(entry.clone());
        Ok(())
    }

    async fn usage_for(&self, id: &KeyId) -> Result<Vec<UsageLogEntry>, DomainError> {
        let usage = self.usage.read().await;
        Ok(usage.iter().filter(|e| &e.key_id == id).cloned().collect())
    }
}
