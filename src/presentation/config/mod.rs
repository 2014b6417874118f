mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    ChunkingSettings, ConversationStoreProvider, DatabaseSettings, EmbeddingProvider,
    EmbeddingsSettings, LlmProvider, LlmSettings, LoggingSettings, RagSettings, ServerSettings,
    SessionSettings, Settings, VectorStoreProvider, VectorStoreSettings,
};
