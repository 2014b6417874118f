use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{LlmClient, LlmClientError, LlmTokenStream};
use crate::domain::{GenerationParams, Prompt};
use crate::infrastructure::framing::{SseLineBuffer, block_data};
use crate::presentation::config::LlmSettings;

const DONE_MARKER: &str = "[DONE]";

/// Chat-completions client for OpenAI-compatible endpoints, streaming only.
pub struct StreamingLlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamError {
    error: serde_json::Value,
}

impl StreamingLlmClient {
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl LlmClient for StreamingLlmClient {
    #[tracing::instrument(skip(self, prompt, params), fields(model = %self.model, messages = prompt.messages.len()))]
    async fn complete_stream(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<LlmTokenStream, LlmClientError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages: prompt
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stop: &params.stop_sequences,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmClientError::ApiRequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmClientError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::ApiRequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(Box::pin(upstream_tokens(bytes)))
    }
}

struct UpstreamState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: SseLineBuffer,
    queued: VecDeque<Result<String, LlmClientError>>,
    done: bool,
}

impl UpstreamState {
    fn handle_block(&mut self, block: &str) {
        if self.done {
            return;
        }
        let Some(data) = block_data(block) else {
            return;
        };
        if data.trim() == DONE_MARKER {
            self.done = true;
            return;
        }

        match serde_json::from_str::<ChatCompletionChunk>(&data) {
            Ok(chunk) => {
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|c| !c.is_empty());
                if let Some(content) = content {
                    self.queued.push_back(Ok(content));
                }
            }
            Err(parse_error) => {
                if let Ok(upstream) = serde_json::from_str::<UpstreamError>(&data) {
                    self.done = true;
                    self.queued.push_back(Err(LlmClientError::InvalidResponse(
                        upstream.error.to_string(),
                    )));
                } else {
                    tracing::warn!(error = %parse_error, "Skipping unparseable completion chunk");
                }
            }
        }
    }
}

fn upstream_tokens(
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
) -> impl futures::Stream<Item = Result<String, LlmClientError>> + Send + 'static {
    let state = UpstreamState {
        bytes,
        buffer: SseLineBuffer::new(),
        queued: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queued.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for block in state.buffer.push(&chunk) {
                        state.handle_block(&block);
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .queued
                        .push_back(Err(LlmClientError::ApiRequestFailed(e.to_string())));
                }
                None => {
                    if let Some(block) = state.buffer.finish() {
                        state.handle_block(&block);
                    }
                    state.done = true;
                }
            }
        }
    })
}

pub fn create_streaming_llm_client(settings: &LlmSettings) -> Result<StreamingLlmClient, LlmClientError> {
    if settings.base_url.trim().is_empty() {
        return Err(LlmClientError::InvalidResponse(
            "llm.base_url is required for the openai provider".to_string(),
        ));
    }

    Ok(StreamingLlmClient::new(
        &settings.base_url,
        settings.api_key.clone(),
        settings.chat_model.clone(),
    ))
}
