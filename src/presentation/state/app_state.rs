use std::sync::Arc;

use crate::application::services::{ChatService, ConversationStore, DocumentIndex, SessionGateway};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub conversations: Arc<ConversationStore>,
    pub document_index: Arc<DocumentIndex>,
    pub sessions: Arc<SessionGateway>,
    pub cookie_secure: bool,
}
