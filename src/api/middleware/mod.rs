//! API middleware components

pub mod admin_auth;
pub mod client_ip;
pub mod metrics;
pub mod security;
pub mod user_auth;

pub use admin_auth::RequireAdmin;
pub use client_ip::{resolve_identity, ClientIdentity};
pub use metrics::metrics_middleware;
pub use security::security_headers_middleware;
pub use user_auth::{extract_jwt_token, RequireUser};
