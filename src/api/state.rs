//! Application state for shared services

use std::sync::Arc;

use crate::domain::Clock;
use crate::infrastructure::api_key::{AdmissionPipeline, ApiKeyService, SlidingWindowLimiter};
use crate::infrastructure::auth::JwtGenerator;
use crate::infrastructure::user::UserService;

/// Services shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub key_service: Arc<ApiKeyService>,
    pub admission: Arc<AdmissionPipeline>,
    pub user_service: Arc<UserService>,
    pub jwt_service: Arc<dyn JwtGenerator>,
    pub clock: Arc<dyn Clock>,
    /// Take the caller identity from `X-Forwarded-For`
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(
        key_service: Arc<ApiKeyService>,
        limiter: Arc<SlidingWindowLimiter>,
        user_service: Arc<UserService>,
        jwt_service: Arc<dyn JwtGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let admission = Arc::new(AdmissionPipeline::new(
            limiter,
            key_service.clone(),
            clock.clone(),
        ));

        Self {
            key_service,
            admission,
            user_service,
            jwt_service,
            clock,
            trust_forwarded_for: false,
        }
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        self.admission.limiter()
    }
}
