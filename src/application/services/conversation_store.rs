use std::sync::Arc;

use crate::application::ports::{ConversationRepository, RepositoryError};
use crate::domain::{
    Conversation, ConversationId, ConversationSummary, DEFAULT_CONVERSATION_TITLE, Message,
    MessageRole,
};

const MAX_TITLE_CHARS: usize = 50;

/// Owner-scoped access to conversations. A conversation owned by someone
/// else is indistinguishable from one that does not exist.
pub struct ConversationStore {
    repository: Arc<dyn ConversationRepository>,
}

impl ConversationStore {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self { repository }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, owner: &str) -> Result<Conversation, ConversationError> {
        let conversation = Conversation::new(owner.to_string());
        self.repository
            .create_conversation(&conversation)
            .await
            .map_err(ConversationError::Repository)?;

        tracing::info!(conversation_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    pub async fn get(
        &self,
        id: ConversationId,
        owner: &str,
    ) -> Result<Conversation, ConversationError> {
        match self
            .repository
            .get_conversation(id)
            .await
            .map_err(ConversationError::Repository)?
        {
            Some(conversation) if conversation.owner == owner => Ok(conversation),
            _ => Err(ConversationError::NotFound(id)),
        }
    }

    pub async fn history(
        &self,
        id: ConversationId,
        owner: &str,
    ) -> Result<Vec<Message>, ConversationError> {
        self.get(id, owner).await?;
        self.repository
            .get_messages(id)
            .await
            .map_err(ConversationError::Repository)
    }

    pub async fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: String,
    ) -> Result<Message, ConversationError> {
        let mut message = Message::new(id, role, content);
        message.position = self
            .repository
            .append_message(&message)
            .await
            .map_err(|e| map_not_found(e, id))?;

        tracing::debug!(
            conversation_id = %id,
            role = %role,
            position = message.position,
            "Message appended"
        );
        Ok(message)
    }

    pub async fn set_title(
        &self,
        id: ConversationId,
        owner: &str,
        title: &str,
    ) -> Result<(), ConversationError> {
        self.get(id, owner).await?;
        self.repository
            .set_title(id, title)
            .await
            .map_err(|e| map_not_found(e, id))
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<ConversationSummary>, ConversationError> {
        self.repository
            .list_conversations(owner)
            .await
            .map_err(ConversationError::Repository)
    }
}

fn map_not_found(error: RepositoryError, id: ConversationId) -> ConversationError {
    match error {
        RepositoryError::NotFound(_) => ConversationError::NotFound(id),
        other => ConversationError::Repository(other),
    }
}

/// Short title from the opening message: whitespace collapsed, cut on a word
/// boundary.
pub fn derive_title(first_message: &str) -> String {
    let collapsed = first_message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    }
    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return collapsed;
    }

    let mut title = String::new();
    for word in collapsed.split(' ') {
        let candidate_len = title.chars().count() + usize::from(!title.is_empty()) + word.chars().count();
        if candidate_len > MAX_TITLE_CHARS {
            break;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(word);
    }

    if title.is_empty() {
        title = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    }
    title.push_str("...");
    title
}

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),
    #[error("repository: {0}")]
    Repository(RepositoryError),
}
