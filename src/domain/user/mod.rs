//! User domain
//!
//! Control-plane users, their roles and the repository trait used for
//! login and registration.

mod entity;
mod repository;
mod validation;

pub use entity::{User, UserId, UserRole};
pub use repository::UserRepository;
pub use validation::{validate_password, validate_username, UserValidationError};

#[cfg(test)]
pub use repository::mock::MockUserRepository;
