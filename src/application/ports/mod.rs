mod conversation_repository;
mod embedder;
mod llm_client;
mod repository_error;
mod search_result;
mod text_splitter;
mod user_repository;
mod vector_store;
mod vector_store_error;

pub use conversation_repository::ConversationRepository;
pub use embedder::{Embedder, EmbedderError};
pub use llm_client::{LlmClient, LlmClientError, LlmTokenStream};
pub use repository_error::RepositoryError;
pub use search_result::SearchResult;
pub use text_splitter::{TextSplitter, TextSplitterError};
pub use user_repository::UserRepository;
pub use vector_store::VectorStore;
pub use vector_store_error::VectorStoreError;
