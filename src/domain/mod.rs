//! Domain layer - Core business logic and entities

pub mod api_key;
pub mod clock;
pub mod error;
pub mod user;

pub use api_key::{
    KeyId, KeyPage, KeyRecord, KeyStore, PageRequest, Usability, UsageLimit, UsageLogEntry,
    UseIncrement,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use user::{User, UserId, UserRepository, UserRole};
