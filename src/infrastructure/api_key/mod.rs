//! API key infrastructure implementations
//!
//! Key value generation, the per-caller rate limiter, the key stores and
//! the services that sit on top of them.

mod admission;
mod generator;
mod postgres_repository;
mod rate_limiter;
mod repository;
mod service;

pub use admission::AdmissionPipeline;
pub use generator::{EntropySource, KeyValueGenerator, OsEntropy};
pub use postgres_repository::PostgresKeyStore;
pub use rate_limiter::{SlidingWindowLimiter, SweeperHandle};
pub use repository::InMemoryKeyStore;
pub use service::{ApiKeyService, IssueKeyRequest, ValidatedKey};
