use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::application::ports::{ConversationRepository, RepositoryError};
use crate::domain::{Conversation, ConversationId, ConversationSummary, Message};

/// Process-local conversation storage. Each conversation sits behind its own
/// mutex; the outer map lock is only held to find it.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<ConversationId, Arc<Mutex<Conversation>>>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: ConversationId) -> Option<Arc<Mutex<Conversation>>> {
        self.conversations.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        if conversations.contains_key(&conversation.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        conversations.insert(conversation.id, Arc::new(Mutex::new(conversation.clone())));
        Ok(())
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        match self.entry(id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn append_message(&self, message: &Message) -> Result<usize, RepositoryError> {
        let entry = self
            .entry(message.conversation_id)
            .await
            .ok_or_else(|| RepositoryError::NotFound(message.conversation_id.to_string()))?;

        let mut conversation = entry.lock().await;
        let position = conversation.messages.len();
        let mut stored = message.clone();
        stored.position = position;
        conversation.messages.push(stored);
        conversation.updated_at = Utc::now();
        Ok(position)
    }

    async fn set_title(&self, id: ConversationId, title: &str) -> Result<(), RepositoryError> {
        let entry = self
            .entry(id)
            .await
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        let mut conversation = entry.lock().await;
        conversation.title = Some(title.to_string());
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn list_conversations(
        &self,
        owner: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let entries: Vec<_> = self.conversations.read().await.values().cloned().collect();

        let mut summaries = Vec::new();
        for entry in entries {
            let conversation = entry.lock().await;
            if conversation.owner == owner {
                summaries.push(conversation.summary());
            }
        }

        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let Some(entry) = self.entry(conversation_id).await else {
            return Ok(Vec::new());
        };

        let messages = entry.lock().await.messages.clone();
        Ok(messages)
    }
}
