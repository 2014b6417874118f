use crate::domain::{Conversation, ConversationId, ConversationSummary, Message};
use async_trait::async_trait;

use super::RepositoryError;

/// Durable record of conversations and their ordered messages.
///
/// Implementations serialize mutations per conversation; appends to
/// distinct conversations must not block each other.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create_conversation(&self, conversation: &Conversation)
    -> Result<(), RepositoryError>;

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Appends at the end of the sequence and returns the assigned position.
    /// Fails with `NotFound` when the conversation does not exist.
    async fn append_message(&self, message: &Message) -> Result<usize, RepositoryError>;

    async fn set_title(&self, id: ConversationId, title: &str) -> Result<(), RepositoryError>;

    /// Most recently updated first.
    async fn list_conversations(
        &self,
        owner: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;

    /// Every message of the conversation in position order.
    async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError>;
}
