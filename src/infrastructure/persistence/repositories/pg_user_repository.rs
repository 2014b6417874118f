use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{RepositoryError, UserRepository};
use crate::domain::User;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::ConstraintViolation(db.to_string())
        }
        other => RepositoryError::QueryFailed(other.to_string()),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.map(|row| {
            Ok(User {
                username: row.try_get("username").map_err(query_failed)?,
                password_hash: row.try_get("password_hash").map_err(query_failed)?,
                created_at: row.try_get("created_at").map_err(query_failed)?,
            })
        })
        .transpose()
    }
}
