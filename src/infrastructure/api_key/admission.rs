//! Admission pipeline for the public validation path
//!
//! The rate limiter runs first on the caller's network identity; only
//! admitted callers reach the key store.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Clock, DomainError};
use crate::infrastructure::observability::record_key_validation;

use super::rate_limiter::SlidingWindowLimiter;
use super::service::{ApiKeyService, ValidatedKey};

/// Limiter plus lifecycle check
#[derive(Debug, Clone)]
pub struct AdmissionPipeline {
    limiter: Arc<SlidingWindowLimiter>,
    keys: Arc<ApiKeyService>,
    clock: Arc<dyn Clock>,
}

impl AdmissionPipeline {
    pub fn new(
        limiter: Arc<SlidingWindowLimiter>,
        keys: Arc<ApiKeyService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            keys,
            clock,
        }
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    /// Decide whether `caller_identity` may use the key `value` right now
    pub async fn admit(
        &self,
        value: &str,
        caller_identity: &str,
    ) -> Result<ValidatedKey, DomainError> {
        let result = self.run(value, caller_identity).await;

        match &result {
            Ok(_) => record_key_validation("ok"),
            Err(e) => record_key_validation(e.kind()),
        }

        result
    }

    async fn run(&self, value: &str, caller_identity: &str) -> Result<ValidatedKey, DomainError> {
        if !self.limiter.allow(caller_identity, self.clock.now()) {
            debug!(caller = caller_identity, "Validation rate limited");
            return Err(DomainError::RateLimited);
        }

        self.keys.validate(value, caller_identity).await
    }
}
