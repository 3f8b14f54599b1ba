use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Rate limit exceeded, retry later")]
    RateLimited,

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("API key has been revoked")]
    Revoked,

    #[error("API key has expired")]
    Expired,

    #[error("API key usage limit exceeded")]
    UsageLimitExceeded,

    #[error("API key is already revoked")]
    AlreadyRevoked,

    #[error("Key generation failed: {message}")]
    Generation { message: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable snake_case code, shared by HTTP error bodies and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound { .. } => "not_found",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::UsageLimitExceeded => "usage_limit_exceeded",
            Self::AlreadyRevoked => "already_revoked",
            Self::Generation { .. } => "generation_error",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Validation { .. } => "validation_error",
            Self::Conflict { .. } => "conflict",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("API key 'abc' not found");
        assert_eq!(error.to_string(), "Not found: API key 'abc' not found");
        assert_eq!(error.kind(), "not_found");
    }

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid input");
        assert_eq!(error.to_string(), "Validation error: Invalid input");
    }

    #[test]
    fn test_lifecycle_kinds_are_distinct() {
        let kinds = [
            DomainError::Revoked.kind(),
            DomainError::Expired.kind(),
            DomainError::UsageLimitExceeded.kind(),
            DomainError::AlreadyRevoked.kind(),
            DomainError::RateLimited.kind(),
        ];

        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
