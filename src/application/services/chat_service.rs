use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::conversation_store::{ConversationError, ConversationStore, derive_title};
use super::document_index::DocumentIndex;
use super::generation_engine::GenerationEngine;
use super::prompt_composer::PromptComposer;
use super::token_counter::count_tokens;
use super::stream_dispatcher::{DispatchOutcome, StreamDispatcher};
use crate::domain::{Conversation, ConversationId, MessageRole, Session, StreamEvent};
use crate::infrastructure::observability::sanitize_prompt;

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub top_k: usize,
    /// Passages scoring below this are not shown to the model.
    pub similarity_threshold: f32,
    pub event_buffer: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            similarity_threshold: 0.0,
            event_buffer: 32,
        }
    }
}

/// Tracks the single in-flight generation allowed per conversation.
#[derive(Default)]
pub struct GenerationRegistry {
    active: Mutex<HashMap<ConversationId, CancellationToken>>,
}

impl GenerationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the conversation, or `None` when a generation is already running.
    pub fn try_begin(self: &Arc<Self>, id: ConversationId) -> Option<GenerationGuard> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.contains_key(&id) {
            return None;
        }

        let token = CancellationToken::new();
        active.insert(id, token.clone());
        Some(GenerationGuard {
            registry: Arc::clone(self),
            id,
            token,
        })
    }

    /// Cancels the running generation. Returns false if there was none.
    pub fn cancel(&self, id: ConversationId) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: ConversationId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

/// Releases the conversation when dropped.
pub struct GenerationGuard {
    registry: Arc<GenerationRegistry>,
    id: ConversationId,
    token: CancellationToken,
}

impl GenerationGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[derive(Debug)]
pub enum ExchangeOutcome {
    /// The index could not be queried; nothing was stored.
    RetrievalFailed(String),
    /// The user message could not be stored; nothing was generated.
    Aborted(String),
    Dispatched(DispatchOutcome),
}

/// Events of one exchange plus a handle on the task producing them.
pub struct ChatStream {
    events: mpsc::Receiver<StreamEvent>,
    exchange: JoinHandle<ExchangeOutcome>,
}

impl ChatStream {
    pub fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, JoinHandle<ExchangeOutcome>) {
        (self.events, self.exchange)
    }
}

impl Stream for ChatStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Runs one retrieval-augmented exchange per user message.
pub struct ChatService {
    conversations: Arc<ConversationStore>,
    index: Arc<DocumentIndex>,
    composer: Arc<PromptComposer>,
    engine: Arc<GenerationEngine>,
    registry: Arc<GenerationRegistry>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        conversations: Arc<ConversationStore>,
        index: Arc<DocumentIndex>,
        composer: Arc<PromptComposer>,
        engine: Arc<GenerationEngine>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            conversations,
            index,
            composer,
            engine,
            registry: Arc::new(GenerationRegistry::new()),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<GenerationRegistry> {
        &self.registry
    }

    /// Validates the request and starts the exchange in the background.
    /// Failures returned here happen before any state is touched.
    #[tracing::instrument(skip(self, session, text), fields(owner = %session.owner, message = %sanitize_prompt(text)))]
    pub async fn send_message(
        &self,
        session: &Session,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<ChatStream, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let limit = self.composer.question_budget();
        if count_tokens(text) > limit {
            return Err(ChatError::MessageTooLong { limit });
        }

        let conversation = self
            .conversations
            .get(conversation_id, &session.owner)
            .await
            .map_err(ChatError::from)?;

        let guard = self
            .registry
            .try_begin(conversation_id)
            .ok_or(ChatError::Busy(conversation_id))?;

        let (sender, receiver) = mpsc::channel(self.settings.event_buffer.max(1));
        let exchange = Exchange {
            conversations: Arc::clone(&self.conversations),
            index: Arc::clone(&self.index),
            composer: Arc::clone(&self.composer),
            engine: Arc::clone(&self.engine),
            settings: self.settings.clone(),
            owner: session.owner.clone(),
        };
        let question = text.to_string();

        let handle = tokio::spawn(async move {
            let outcome = exchange.run(conversation, question, guard.token().clone(), sender).await;
            drop(guard);
            outcome
        });

        Ok(ChatStream {
            events: receiver,
            exchange: handle,
        })
    }

    /// Cancels the generation running for a conversation the caller owns.
    pub async fn stop(&self, conversation_id: ConversationId, owner: &str) -> Result<(), ChatError> {
        self.conversations
            .get(conversation_id, owner)
            .await
            .map_err(ChatError::from)?;

        if self.registry.cancel(conversation_id) {
            tracing::info!(conversation_id = %conversation_id, "Generation stop requested");
            Ok(())
        } else {
            Err(ChatError::NotGenerating(conversation_id))
        }
    }
}

struct Exchange {
    conversations: Arc<ConversationStore>,
    index: Arc<DocumentIndex>,
    composer: Arc<PromptComposer>,
    engine: Arc<GenerationEngine>,
    settings: ChatSettings,
    owner: String,
}

impl Exchange {
    #[tracing::instrument(skip_all, fields(conversation_id = %conversation.id))]
    async fn run(
        self,
        conversation: Conversation,
        question: String,
        cancel: CancellationToken,
        events: mpsc::Sender<StreamEvent>,
    ) -> ExchangeOutcome {
        let conversation_id = conversation.id;

        let passages = match self.index.query(&question, self.settings.top_k).await {
            Ok(results) => results
                .into_iter()
                .filter(|r| r.score >= self.settings.similarity_threshold)
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::error!(error = %e, "Retrieval failed");
                let message = format!("retrieval failed: {}", e);
                let _ = events.send(StreamEvent::Error(message.clone())).await;
                return ExchangeOutcome::RetrievalFailed(message);
            }
        };
        tracing::debug!(passages = passages.len(), "Passages retrieved");

        if let Err(e) = self
            .conversations
            .append_message(conversation_id, MessageRole::User, question.clone())
            .await
        {
            tracing::error!(error = %e, "Failed to store user message");
            let message = format!("could not store message: {}", e);
            let _ = events.send(StreamEvent::Error(message.clone())).await;
            return ExchangeOutcome::Aborted(message);
        }

        if conversation.title.is_none() && conversation.messages.is_empty() {
            let title = derive_title(&question);
            if let Err(e) = self
                .conversations
                .set_title(conversation_id, &self.owner, &title)
                .await
            {
                tracing::warn!(error = %e, "Failed to set conversation title");
            }
        }

        let prompt = self
            .composer
            .compose(&conversation.messages, &question, &passages);
        let tokens = self.engine.generate(prompt, cancel);
        let outcome = StreamDispatcher::forward(tokens, events).await;

        if !outcome.text.is_empty() {
            if let Err(e) = self
                .conversations
                .append_message(conversation_id, MessageRole::Assistant, outcome.text.clone())
                .await
            {
                tracing::error!(error = %e, "Failed to store assistant message");
            }
        }

        tracing::info!(
            termination = ?outcome.termination,
            chars = outcome.text.len(),
            "Exchange finished"
        );
        ExchangeOutcome::Dispatched(outcome)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("message is longer than {limit} tokens")]
    MessageTooLong { limit: usize },
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),
    #[error("a reply is already being generated for conversation {0}")]
    Busy(ConversationId),
    #[error("no reply is being generated for conversation {0}")]
    NotGenerating(ConversationId),
    #[error("conversation store: {0}")]
    Store(ConversationError),
}

impl From<ConversationError> for ChatError {
    fn from(error: ConversationError) -> Self {
        match error {
            ConversationError::NotFound(id) => ChatError::NotFound(id),
            other => ChatError::Store(other),
        }
    }
}
