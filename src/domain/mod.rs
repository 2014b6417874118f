mod chunk;
mod conversation;
mod conversation_id;
mod document;
mod embedding;
mod generation_params;
mod message;
mod message_id;
mod message_role;
mod prompt;
mod session;
mod stream_event;
mod user;

pub use chunk::{Chunk, ChunkId};
pub use conversation::{Conversation, ConversationSummary, DEFAULT_CONVERSATION_TITLE};
pub use conversation_id::ConversationId;
pub use document::SourceDocument;
pub use embedding::Embedding;
pub use generation_params::GenerationParams;
pub use message::Message;
pub use message_id::MessageId;
pub use message_role::MessageRole;
pub use prompt::{Prompt, PromptMessage, PromptRole};
pub use session::{Session, SessionToken};
pub use stream_event::StreamEvent;
pub use user::User;
