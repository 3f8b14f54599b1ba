//! User infrastructure module
//!
//! Argon2 password hashing, user repositories and the user service behind
//! the control-plane login.

mod password;
mod postgres_repository;
mod repository;
mod service;

pub use password::{Argon2Hasher, PasswordHasher};
pub use postgres_repository::PostgresUserRepository;
pub use repository::InMemoryUserRepository;
pub use service::UserService;
