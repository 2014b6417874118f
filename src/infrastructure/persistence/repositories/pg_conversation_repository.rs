use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{ConversationRepository, RepositoryError};
use crate::domain::{
    Conversation, ConversationId, ConversationSummary, DEFAULT_CONVERSATION_TITLE, Message,
    MessageId, MessageRole,
};

pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
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

fn message_from_row(row: &PgRow) -> Result<Message, RepositoryError> {
    let role: String = row.try_get("role").map_err(query_failed)?;
    let position: i64 = row.try_get("position").map_err(query_failed)?;

    Ok(Message {
        id: MessageId::from_uuid(row.try_get("id").map_err(query_failed)?),
        conversation_id: ConversationId::from_uuid(
            row.try_get("conversation_id").map_err(query_failed)?,
        ),
        role: role.parse::<MessageRole>().map_err(RepositoryError::QueryFailed)?,
        content: row.try_get("content").map_err(query_failed)?,
        position: position as usize,
        created_at: row.try_get("created_at").map_err(query_failed)?,
    })
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, owner, title, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conversation.id.as_uuid())
        .bind(&conversation.owner)
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self), fields(conversation_id = %id))]
    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, title, created_at, updated_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages = self.get_messages(id).await?;
        let row_id: Uuid = row.try_get("id").map_err(query_failed)?;

        Ok(Some(Conversation {
            id: ConversationId::from_uuid(row_id),
            owner: row.try_get("owner").map_err(query_failed)?,
            title: row.try_get("title").map_err(query_failed)?,
            messages,
            created_at: row.try_get("created_at").map_err(query_failed)?,
            updated_at: row.try_get("updated_at").map_err(query_failed)?,
        }))
    }

    #[instrument(skip(self, message), fields(message_id = %message.id.as_uuid(), conversation_id = %message.conversation_id))]
    async fn append_message(&self, message: &Message) -> Result<usize, RepositoryError> {
        let conversation_id = message.conversation_id.as_uuid();
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        // Row lock serializes appends to this conversation only.
        let locked = sqlx::query("SELECT id FROM conversations WHERE id = $1 FOR UPDATE")
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed)?;

        if locked.is_none() {
            return Err(RepositoryError::NotFound(conversation_id.to_string()));
        }

        let next_position: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(query_failed)?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, position, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(next_position)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        tx.commit().await.map_err(query_failed)?;

        Ok(next_position as usize)
    }

    #[instrument(skip(self, title), fields(conversation_id = %id))]
    async fn set_title(&self, id: ConversationId, title: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET title = $1, updated_at = $2 WHERE id = $3")
            .bind(title)
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_conversations(
        &self,
        owner: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, created_at, updated_at
            FROM conversations
            WHERE owner = $1
            ORDER BY updated_at DESC, created_at DESC, id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter()
            .map(|row| {
                let title: Option<String> = row.try_get("title").map_err(query_failed)?;
                let created_at: DateTime<Utc> = row.try_get("created_at").map_err(query_failed)?;
                Ok(ConversationSummary {
                    id: ConversationId::from_uuid(row.try_get("id").map_err(query_failed)?),
                    title: title.unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string()),
                    created_at,
                    updated_at: row.try_get("updated_at").map_err(query_failed)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, role, content, position, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(message_from_row).collect()
    }
}
