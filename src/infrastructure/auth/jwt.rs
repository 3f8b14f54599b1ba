//! JWT token generation and validation for control-plane users

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::user::{User, UserId, UserRole};
use crate::domain::DomainError;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 8;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub role: UserRole,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
}

impl JwtClaims {
    /// Create new claims for a user, issued at `now`
    pub fn new(user: &User, expiration_hours: u64, now: DateTime<Utc>) -> Self {
        let ttl = Duration::try_hours(i64::try_from(expiration_hours).unwrap_or(i64::MAX))
            .unwrap_or(Duration::MAX);
        let exp = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            sub: user.id().to_string(),
            username: user.username().to_string(),
            role: user.role(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    /// Parse the subject as a user ID
    pub fn user_id(&self) -> Result<UserId, DomainError> {
        self.sub
            .parse()
            .map_err(|_| DomainError::unauthorized("Token subject is not a user ID"))
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Configuration for JWT service
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret used to sign tokens
    pub secret: String,
    pub expiration_hours: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiration_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
        }
    }
}

/// Trait for JWT operations
pub trait JwtGenerator: Send + Sync + Debug {
    /// Generate a signed token for a user
    fn generate(&self, user: &User) -> Result<String, DomainError>;

    /// Validate a token and return its claims
    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError>;

    /// Token lifetime in hours
    fn expiration_hours(&self) -> u64;
}

/// HS256 JWT service
#[derive(Clone)]
pub struct JwtService {
    expiration_hours: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_hours", &self.expiration_hours)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service; the secret must not be empty
    pub fn new(config: JwtConfig) -> Result<Self, DomainError> {
        if config.secret.is_empty() {
            return Err(DomainError::validation("JWT secret must not be empty"));
        }

        Ok(Self {
            expiration_hours: config.expiration_hours,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        })
    }
}

impl JwtGenerator for JwtService {
    fn generate(&self, user: &User) -> Result<String, DomainError> {
        let claims = JwtClaims::new(user, self.expiration_hours, Utc::now());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to generate JWT: {}", e)))
    }

    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| DomainError::unauthorized(format!("Invalid token: {}", e)))
    }

    fn expiration_hours(&self) -> u64 {
        self.expiration_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> JwtService {
        JwtService::new(JwtConfig::new(secret, DEFAULT_TOKEN_TTL_HOURS)).unwrap()
    }

    #[test]
    fn test_generate_and_validate() {
        let jwt = service("test-secret");
        let user = User::new("alice", "hash", UserRole::Admin);

        let token = jwt.generate(&user).unwrap();
        let claims = jwt.validate(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), *user.id());
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin());
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let user = User::new("alice", "hash", UserRole::User);
        let token = service("secret-a").generate(&user).unwrap();

        let result = service("secret-b").validate(&token);
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = service("test-secret");
        let user = User::new("alice", "hash", UserRole::User);

        let claims = JwtClaims::new(&user, 1, Utc::now() - Duration::hours(3));
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(jwt.validate(&token), Err(DomainError::Unauthorized { .. })));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let result = service("test-secret").validate("not.a.token");
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = JwtService::new(JwtConfig::new("", 8));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_debug_hides_keys() {
        let debug = format!("{:?}", service("super-secret"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[hidden]"));
    }
}
