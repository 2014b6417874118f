use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{LlmClient, LlmClientError};
use crate::domain::{GenerationParams, Prompt};

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Longest wait for the model to start and yield its first token.
    pub first_token_timeout: Duration,
    /// Longest wait between two consecutive tokens.
    pub idle_timeout: Duration,
    pub buffer_size: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            first_token_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            buffer_size: 32,
        }
    }
}

/// Drives the model for one prompt at a time and exposes the result as a
/// bounded, cancellable token stream.
pub struct GenerationEngine {
    client: Arc<dyn LlmClient>,
    params: GenerationParams,
    settings: GenerationSettings,
}

impl GenerationEngine {
    pub fn new(client: Arc<dyn LlmClient>, params: GenerationParams, settings: GenerationSettings) -> Self {
        Self {
            client,
            params,
            settings,
        }
    }

    /// Starts producing tokens for `prompt`. The producer stops as soon as
    /// `cancel` fires or the returned stream is dropped.
    pub fn generate(&self, prompt: Prompt, cancel: CancellationToken) -> TokenStream {
        let (sender, receiver) = mpsc::channel(self.settings.buffer_size.max(1));
        let producer = Producer {
            client: Arc::clone(&self.client),
            params: self.params.clone(),
            settings: self.settings.clone(),
            cancel: cancel.clone(),
            sender,
        };

        tokio::spawn(producer.run(prompt));

        TokenStream { receiver, cancel }
    }
}

struct Producer {
    client: Arc<dyn LlmClient>,
    params: GenerationParams,
    settings: GenerationSettings,
    cancel: CancellationToken,
    sender: mpsc::Sender<Result<String, GenerationError>>,
}

impl Producer {
    async fn run(self, prompt: Prompt) {
        // Starting the model and its first token share one window.
        let first_token_deadline = Instant::now() + self.settings.first_token_timeout;

        let started = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("Generation cancelled before start");
                return;
            }
            result = tokio::time::timeout_at(
                first_token_deadline,
                self.client.complete_stream(&prompt, &self.params),
            ) => result,
        };

        let mut model_stream = match started {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Model failed to start generation");
                self.emit(Err(GenerationError::Model(e))).await;
                return;
            }
            Err(_) => {
                tracing::error!("Model did not start within timeout");
                self.emit(Err(GenerationError::Timeout(self.settings.first_token_timeout)))
                    .await;
                return;
            }
        };

        let mut filter = StopSequenceFilter::new(self.params.stop_sequences.clone());
        let mut consumed = 0usize;

        loop {
            let (deadline, window) = if consumed == 0 {
                (first_token_deadline, self.settings.first_token_timeout)
            } else {
                (Instant::now() + self.settings.idle_timeout, self.settings.idle_timeout)
            };

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(tokens = consumed, "Generation cancelled");
                    return;
                }
                next = tokio::time::timeout_at(deadline, model_stream.next()) => next,
            };

            match next {
                Err(_) => {
                    tracing::warn!(tokens = consumed, timeout_ms = window.as_millis() as u64, "Generation timed out");
                    self.emit(Err(GenerationError::Timeout(window))).await;
                    return;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, tokens = consumed, "Model failed mid-stream");
                    let pending = filter.finish();
                    if !pending.is_empty() && !self.emit(Ok(pending)).await {
                        return;
                    }
                    self.emit(Err(GenerationError::Model(e))).await;
                    return;
                }
                Ok(Some(Ok(token))) => {
                    consumed += 1;
                    let step = filter.push(&token);
                    if !step.text.is_empty() && !self.emit(Ok(step.text)).await {
                        return;
                    }
                    if step.stopped {
                        tracing::debug!(tokens = consumed, "Stop sequence reached");
                        return;
                    }
                    if consumed >= self.params.max_tokens {
                        tracing::debug!(tokens = consumed, "Max tokens reached");
                        break;
                    }
                }
            }
        }

        let pending = filter.finish();
        if !pending.is_empty() {
            self.emit(Ok(pending)).await;
        }
    }

    /// Blocks while the consumer is behind. Returns false once nobody is
    /// listening any more.
    async fn emit(&self, item: Result<String, GenerationError>) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.sender.send(item) => sent.is_ok(),
        }
    }
}

/// Single-use stream of generated tokens. An `Err` item is terminal.
pub struct TokenStream {
    receiver: mpsc::Receiver<Result<String, GenerationError>>,
    cancel: CancellationToken,
}

impl TokenStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for TokenStream {
    type Item = Result<String, GenerationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilterStep {
    pub text: String,
    pub stopped: bool,
}

/// Cuts the token stream at the first stop sequence. Text that could be the
/// start of a stop sequence is held back until it is disambiguated.
#[derive(Debug, Default)]
pub struct StopSequenceFilter {
    stop_sequences: Vec<String>,
    pending: String,
    stopped: bool,
}

impl StopSequenceFilter {
    pub fn new(stop_sequences: Vec<String>) -> Self {
        Self {
            stop_sequences: stop_sequences.into_iter().filter(|s| !s.is_empty()).collect(),
            pending: String::new(),
            stopped: false,
        }
    }

    pub fn push(&mut self, token: &str) -> FilterStep {
        if self.stopped {
            return FilterStep {
                text: String::new(),
                stopped: true,
            };
        }

        self.pending.push_str(token);

        let first_match = self
            .stop_sequences
            .iter()
            .filter_map(|stop| self.pending.find(stop.as_str()))
            .min();

        if let Some(index) = first_match {
            self.stopped = true;
            let text = self.pending[..index].to_string();
            self.pending.clear();
            return FilterStep {
                text,
                stopped: true,
            };
        }

        let holdback = self.holdback_len();
        let emit_len = self.pending.len() - holdback;
        let text: String = self.pending.drain(..emit_len).collect();
        FilterStep {
            text,
            stopped: false,
        }
    }

    /// Releases whatever was held back; call once the model stream ended.
    pub fn finish(&mut self) -> String {
        if self.stopped {
            return String::new();
        }
        std::mem::take(&mut self.pending)
    }

    fn holdback_len(&self) -> usize {
        self.stop_sequences
            .iter()
            .flat_map(|stop| {
                (1..stop.len())
                    .filter(|&k| stop.is_char_boundary(k))
                    .filter(|&k| self.pending.ends_with(&stop[..k]))
            })
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model error: {0}")]
    Model(LlmClientError),
    #[error("no token produced within {0:?}")]
    Timeout(Duration),
}
