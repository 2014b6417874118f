mod embedder_factory;
mod hash_embedder;
mod mock_llm_client;
mod openai_embedder;
mod streaming_client;

pub use embedder_factory::{EmbedderFactory, EmbedderFactoryError};
pub use hash_embedder::HashEmbedder;
pub use mock_llm_client::MockLlmClient;
pub use openai_embedder::OpenAiEmbedder;
pub use streaming_client::{StreamingLlmClient, create_streaming_llm_client};
