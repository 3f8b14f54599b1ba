//! Infrastructure layer - Store adapters, services and process plumbing

pub mod api_key;
pub mod auth;
pub mod logging;
pub mod observability;
pub mod storage;
pub mod user;
