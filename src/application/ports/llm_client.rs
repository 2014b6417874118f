use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::domain::{GenerationParams, Prompt};

pub type LlmTokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmClientError>> + Send + 'static>>;

/// Opaque text generation capability: a prompt in, a lazy token stream out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete_stream(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<LlmTokenStream, LlmClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmClientError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}
