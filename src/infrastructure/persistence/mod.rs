mod pg_pool;
mod repositories;
mod vector_store;

pub use pg_pool::create_pool;
pub use repositories::{
    InMemoryConversationRepository, InMemoryUserRepository, PgConversationRepository,
    PgUserRepository,
};
pub use vector_store::{InMemoryVectorStore, QdrantAdapter};
