use super::{ConversationId, Message};
use chrono::{DateTime, Utc};

pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(owner: String) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            owner,
            title: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_CONVERSATION_TITLE)
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.display_title().to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing projection of a conversation, without its messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
