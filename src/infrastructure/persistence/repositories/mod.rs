mod in_memory_conversation_repository;
mod in_memory_user_repository;
mod pg_conversation_repository;
mod pg_user_repository;

pub use in_memory_conversation_repository::InMemoryConversationRepository;
pub use in_memory_user_repository::InMemoryUserRepository;
pub use pg_conversation_repository::PgConversationRepository;
pub use pg_user_repository::PgUserRepository;
