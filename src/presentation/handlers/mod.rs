mod auth;
mod chat;
mod conversations;
mod documents;
mod health;

pub use auth::{check_auth_handler, login_handler, logout_handler, register_handler};
pub use chat::chat_handler;
pub use conversations::{
    create_conversation_handler, history_handler, list_conversations_handler, stop_handler,
    title_handler,
};
pub use documents::ingest_documents_handler;
pub use health::health_handler;
