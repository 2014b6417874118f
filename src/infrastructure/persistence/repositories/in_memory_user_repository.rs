use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::{RepositoryError, UserRepository};
use crate::domain::User;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `users` already registered; later duplicates are dropped.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut map = HashMap::new();
        for user in users {
            map.entry(user.username.clone()).or_insert(user);
        }
        Self {
            users: RwLock::new(map),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "user {} already exists",
                user.username
            )));
        }
        users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(username).cloned())
    }
}
