//! User service for control-plane authentication and registration

use std::sync::Arc;

use tracing::info;

use crate::domain::user::{validate_password, validate_username, User, UserId, UserRepository, UserRole};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// User service for authentication and management
#[derive(Debug, Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Create a new user service
    pub fn new(repository: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { repository, hasher }
    }

    /// Register a new user
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, DomainError> {
        validate_username(username).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_password(password).map_err(|e| DomainError::validation(e.to_string()))?;

        if self.repository.username_exists(username).await? {
            return Err(DomainError::conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let password_hash = self.hasher.hash(password)?;
        let user = self
            .repository
            .create(User::new(username, password_hash, role))
            .await?;

        info!(user_id = %user.id(), role = %user.role(), "User registered");

        Ok(user)
    }

    /// Authenticate a user with username and password
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let Some(user) = self.repository.get_by_username(username).await? else {
            return Ok(None);
        };

        if !self.hasher.verify(password, user.password_hash()) {
            return Ok(None);
        }

        self.repository.record_login(user.id()).await?;

        // Re-fetch to pick up last_login_at
        self.repository.get(user.id()).await
    }

    /// Get a user by ID
    pub async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        self.repository.get(id).await
    }

    /// Count users
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }

    /// Create the bootstrap administrator unless the username is already taken
    ///
    /// Returns the created user, or `None` when it already existed.
    pub async fn ensure_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        if self.repository.username_exists(username).await? {
            return Ok(None);
        }

        match self.register(username, password, UserRole::Admin).await {
            Ok(user) => Ok(Some(user)),
            // Another instance bootstrapped first
            Err(DomainError::Conflict { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::MockUserRepository;
    use crate::infrastructure::user::{Argon2Hasher, InMemoryUserRepository};

    fn hasher() -> Arc<Argon2Hasher> {
        Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap())
    }

    fn create_service() -> UserService {
        UserService::new(Arc::new(InMemoryUserRepository::new()), hasher())
    }

    #[tokio::test]
    async fn test_register_user() {
        let service = create_service();

        let user = service
            .register("testuser", "secure_password123", UserRole::User)
            .await
            .unwrap();

        assert_eq!(user.username(), "testuser");
        assert_eq!(user.role(), UserRole::User);
        assert_ne!(user.password_hash(), "secure_password123");
    }

    #[tokio::test]
    async fn test_register_invalid_username() {
        let service = create_service();

        let result = service
            .register("ab", "secure_password123", UserRole::User)
            .await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));

        let result = service
            .register("has space", "secure_password123", UserRole::User)
            .await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_register_short_password() {
        let service = create_service();

        let result = service.register("testuser", "short", UserRole::User).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let service = create_service();

        service
            .register("testuser", "secure_password123", UserRole::User)
            .await
            .unwrap();

        let result = service
            .register("testuser", "secure_password456", UserRole::Admin)
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = create_service();
        service
            .register("testuser", "secure_password123", UserRole::User)
            .await
            .unwrap();

        let user = service
            .authenticate("testuser", "secure_password123")
            .await
            .unwrap()
            .unwrap();
        assert!(user.last_login_at().is_some());

        let wrong = service.authenticate("testuser", "wrong_password").await.unwrap();
        assert!(wrong.is_none());

        let missing = service.authenticate("nobody", "secure_password123").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = create_service();

        let created = service.ensure_admin("root", "bootstrap-password").await.unwrap();
        assert!(created.unwrap().is_admin());

        let again = service.ensure_admin("root", "different-password").await.unwrap();
        assert!(again.is_none());
        assert_eq!(service.count().await.unwrap(), 1);

        // The original password still works
        let user = service.authenticate("root", "bootstrap-password").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let repo = Arc::new(MockUserRepository::new());
        repo.set_should_fail(true).await;
        let service = UserService::new(repo, hasher());

        let result = service.authenticate("testuser", "secure_password123").await;
        assert!(matches!(result, Err(DomainError::StoreUnavailable { .. })));
    }
}
