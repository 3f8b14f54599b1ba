//! Authentication infrastructure module
//!
//! JWT token management for control-plane users.

mod jwt;

pub use jwt::{JwtClaims, JwtConfig, JwtGenerator, JwtService, DEFAULT_TOKEN_TTL_HOURS};
