use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::password_hasher::PasswordHasher;
use crate::application::ports::{RepositoryError, UserRepository};
use crate::domain::{Session, SessionToken, User};

#[derive(Debug, Clone, Deserialize)]
pub struct UserCredential {
    pub username: String,
    /// Encoded hash as produced by `PasswordHasher::hash`.
    pub password_hash: String,
}

/// Registers users, checks their passwords and issues opaque session tokens.
pub struct SessionGateway {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionGateway {
    pub fn new(users: Arc<dyn UserRepository>, hasher: PasswordHasher, ttl: Duration) -> Self {
        Self {
            users,
            hasher,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates configured accounts that do not exist yet. Returns how many
    /// were added.
    #[tracing::instrument(skip_all, fields(configured = credentials.len()))]
    pub async fn seed(&self, credentials: &[UserCredential]) -> Result<usize, SessionError> {
        let mut added = 0;
        for credential in credentials {
            if !PasswordHasher::is_well_formed(&credential.password_hash) {
                return Err(SessionError::InvalidPasswordHash(credential.username.clone()));
            }

            let user = User::new(credential.username.trim(), credential.password_hash.clone());
            match self.users.create_user(&user).await {
                Ok(()) => added += 1,
                Err(RepositoryError::ConstraintViolation(_)) => {
                    tracing::debug!(username = %user.username, "Configured user already exists");
                }
                Err(e) => return Err(SessionError::Storage(e)),
            }
        }
        Ok(added)
    }

    /// Creates an account and opens a session for it.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        let hasher = self.hasher.clone();
        let owned_password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&owned_password))
            .await
            .map_err(|e| SessionError::Hashing(e.to_string()))?;

        match self.users.create_user(&User::new(username, password_hash)).await {
            Ok(()) => {}
            Err(RepositoryError::ConstraintViolation(_)) => {
                tracing::warn!("Registration with a taken username");
                return Err(SessionError::UsernameTaken);
            }
            Err(e) => return Err(SessionError::Storage(e)),
        }

        tracing::info!("User registered");
        Ok(self.open_session(username).await)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let username = username.trim();
        let Some(user) = self
            .users
            .find_user(username)
            .await
            .map_err(SessionError::Storage)?
        else {
            tracing::warn!("Login attempt for unknown user");
            return Err(SessionError::InvalidCredentials);
        };

        let hasher = self.hasher.clone();
        let owned_password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || {
            hasher.verify(&owned_password, &user.password_hash)
        })
        .await
        .map_err(|e| SessionError::Hashing(e.to_string()))?;

        if !matches {
            tracing::warn!("Login attempt with wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        Ok(self.open_session(username).await)
    }

    async fn open_session(&self, owner: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            token: SessionToken::new(generate_token()),
            owner: owner.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        if sessions.len() < before {
            tracing::debug!(evicted = before - sessions.len(), "Expired sessions swept");
        }
        sessions.insert(session.token.as_str().to_string(), session.clone());
        drop(sessions);

        tracing::info!(expires_at = %session.expires_at, "Session opened");
        session
    }

    pub async fn validate(&self, token: Option<&str>) -> Result<Session, SessionError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::Unauthorized)?;

        let found = self.sessions.read().await.get(token).cloned();
        match found {
            Some(session) if !session.is_expired_at(Utc::now()) => Ok(session),
            Some(session) => {
                self.sessions.write().await.remove(token);
                tracing::debug!(owner = %session.owner, "Expired session evicted");
                Err(SessionError::Unauthorized)
            }
            None => Err(SessionError::Unauthorized),
        }
    }

    /// Returns whether a live session was revoked.
    pub async fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token);
        if let Some(session) = &removed {
            tracing::info!(owner = %session.owner, "Session revoked");
        }
        removed.is_some()
    }

    pub async fn active_sessions(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| !s.is_expired_at(now))
            .count()
    }

    /// Sessions held in memory, including expired ones not yet swept.
    pub async fn tracked_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username and password are required")]
    MissingCredentials,
    #[error("username already exists")]
    UsernameTaken,
    #[error("configured user {0} has a malformed password hash")]
    InvalidPasswordHash(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("user store: {0}")]
    Storage(RepositoryError),
}
