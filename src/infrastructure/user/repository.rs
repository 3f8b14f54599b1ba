//! In-memory user repository implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct UserTable {
    by_id: HashMap<UserId, User>,
    /// username -> user ID
    by_username: HashMap<String, UserId>,
}

/// In-memory implementation of UserRepository
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let users = self.users.read().await;
        Ok(users.by_id.get(id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let users = self.users.read().await;

        Ok(users
            .by_username
            .get(username)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut users = self.users.write().await;

        if users.by_id.contains_key(user.id()) {
            return Err(DomainError::conflict(format!(
                "User with ID '{}' already exists",
                user.id()
            )));
        }

        if users.by_username.contains_key(user.username()) {
            return Err(DomainError::conflict(format!(
                "Username '{}' already exists",
                user.username()
            )));
        }

        users
            .by_username
            .insert(user.username().to_string(), *user.id());
        users.by_id.insert(*user.id(), user.clone());

        Ok(user)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.users.read().await.by_id.len())
    }

    async fn record_login(&self, id: &UserId) -> Result<(), DomainError> {
        let mut users = self.users.write().await;

        users
            .by_id
            .get_mut(id)
            .map(User::record_login)
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
    }
}
