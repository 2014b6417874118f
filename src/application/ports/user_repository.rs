use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::User;

/// Registered accounts, keyed by username.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `ConstraintViolation` when the username is already taken.
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, RepositoryError>;
}
