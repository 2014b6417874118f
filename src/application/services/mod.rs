mod chat_service;
mod conversation_store;
mod document_index;
mod generation_engine;
mod password_hasher;
mod prompt_composer;
mod session_gateway;
mod stream_dispatcher;
mod token_counter;

pub use chat_service::{
    ChatError, ChatService, ChatSettings, ChatStream, ExchangeOutcome, GenerationGuard,
    GenerationRegistry,
};
pub use conversation_store::{ConversationError, ConversationStore, derive_title};
pub use document_index::{DocumentIndex, IngestReport, IngestionError, RetrievalError, compare_results};
pub use generation_engine::{
    FilterStep, GenerationEngine, GenerationError, GenerationSettings, StopSequenceFilter,
    TokenStream,
};
pub use password_hasher::{DEFAULT_PASSWORD_ITERATIONS, PasswordHasher};
pub use prompt_composer::{PromptComposer, PromptComposerSettings};
pub use session_gateway::{SessionError, SessionGateway, UserCredential};
pub use stream_dispatcher::{DispatchOutcome, StreamDispatcher, Termination};
pub use token_counter::{count_tokens, truncate_to_last_tokens, truncate_to_tokens};
