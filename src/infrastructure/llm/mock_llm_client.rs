use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{LlmClient, LlmClientError, LlmTokenStream};
use crate::domain::{GenerationParams, Prompt};

const SCAFFOLD_ANSWER: &str = "This is a scaffold response. Configure an LLM provider to get real answers.";

/// Deterministic model used in scaffold mode and tests: replays a fixed token
/// script, optionally failing or stalling part way.
pub struct MockLlmClient {
    script: Vec<String>,
    fail_after: Option<usize>,
    fail_to_start: bool,
    stall_after: Option<usize>,
    start_delay: Duration,
    token_delay: Duration,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockLlmClient {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: tokens.into_iter().map(Into::into).collect(),
            fail_after: None,
            fail_to_start: false,
            stall_after: None,
            start_delay: Duration::ZERO,
            token_delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn scaffold(token_delay: Duration) -> Self {
        let tokens: Vec<String> = SCAFFOLD_ANSWER
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        Self::new(tokens).with_token_delay(token_delay)
    }

    /// Yields the first `n` tokens, then a model error.
    pub fn with_failure_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn failing_to_start(mut self) -> Self {
        self.fail_to_start = true;
        self
    }

    /// Yields the first `n` tokens, then never yields again.
    pub fn stalling_after(mut self, n: usize) -> Self {
        self.stall_after = Some(n);
        self
    }

    /// Waits this long before the token stream is handed back.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_stream(
        &self,
        prompt: &Prompt,
        _params: &GenerationParams,
    ) -> Result<LlmTokenStream, LlmClientError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }

        if self.fail_to_start {
            return Err(LlmClientError::ApiRequestFailed("mock model unavailable".to_string()));
        }

        let script = self.script.clone();
        let fail_after = self.fail_after;
        let stall_after = self.stall_after;
        let delay = self.token_delay;

        let stream = futures::stream::unfold(0usize, move |index| {
            let script = script.clone();
            async move {
                if stall_after == Some(index) {
                    futures::future::pending::<()>().await;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if fail_after == Some(index) {
                    let error = LlmClientError::ApiRequestFailed("mock model failure".to_string());
                    return Some((Err(error), usize::MAX));
                }
                script.get(index).map(|token| (Ok(token.clone()), index + 1))
            }
        });

        Ok(Box::pin(stream))
    }
}
