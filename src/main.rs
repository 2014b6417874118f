use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use ragchat::application::ports::{ConversationRepository, LlmClient, UserRepository, VectorStore};
use ragchat::application::services::{
    ChatService, ChatSettings, ConversationStore, DocumentIndex, GenerationEngine,
    GenerationSettings, PasswordHasher, PromptComposer, PromptComposerSettings, SessionGateway,
};
use ragchat::domain::GenerationParams;
use ragchat::infrastructure::llm::{EmbedderFactory, MockLlmClient, create_streaming_llm_client};
use ragchat::infrastructure::observability::{TracingConfig, init_tracing};
use ragchat::infrastructure::persistence::{
    InMemoryConversationRepository, InMemoryUserRepository, InMemoryVectorStore,
    PgConversationRepository, PgUserRepository, QdrantAdapter, create_pool,
};
use ragchat::infrastructure::text_processing::RecursiveCharacterSplitter;
use ragchat::presentation::config::{
    ConversationStoreProvider, LlmProvider, Settings, VectorStoreProvider,
};
use ragchat::presentation::{AppState, Environment, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load configuration")?;

    init_tracing(
        TracingConfig::from_settings(&settings.logging, environment),
        settings.server.port,
    );

    let llm_client: Arc<dyn LlmClient> = match settings.llm.provider {
        LlmProvider::OpenAi => Arc::new(create_streaming_llm_client(&settings.llm)?),
        LlmProvider::Scaffold => {
            tracing::warn!("Scaffold mode: replies come from a canned mock model");
            Arc::new(MockLlmClient::scaffold(Duration::from_millis(
                settings.llm.scaffold_token_delay_ms,
            )))
        }
    };

    let embedder = EmbedderFactory::create(&settings.embeddings)?;

    let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        VectorStoreProvider::Memory => Arc::new(InMemoryVectorStore::new()),
        VectorStoreProvider::Qdrant => {
            let adapter = QdrantAdapter::new(
                &settings.vector_store.url,
                settings.vector_store.collection_name.clone(),
            )
            .await?;
            adapter.ensure_collection(settings.embeddings.dimension).await?;
            Arc::new(adapter)
        }
    };

    let (repository, users): (Arc<dyn ConversationRepository>, Arc<dyn UserRepository>) =
        match settings.database.provider {
            ConversationStoreProvider::Memory => (
                Arc::new(InMemoryConversationRepository::new()),
                Arc::new(InMemoryUserRepository::new()),
            ),
            ConversationStoreProvider::Postgres => {
                let pool =
                    create_pool(&settings.database.url, settings.database.max_connections).await?;
                (
                    Arc::new(PgConversationRepository::new(pool.clone())),
                    Arc::new(PgUserRepository::new(pool)),
                )
            }
        };

    let text_splitter = Arc::new(RecursiveCharacterSplitter::new(
        settings.chunking.chunk_size,
        settings.chunking.chunk_overlap,
    )?);

    let document_index = Arc::new(DocumentIndex::new(
        embedder,
        vector_store,
        text_splitter,
        settings.embeddings.dimension,
    ));
    let conversations = Arc::new(ConversationStore::new(repository));

    let composer = Arc::new(PromptComposer::new(PromptComposerSettings {
        system_instruction: settings.rag.system_instruction.clone(),
        max_prompt_tokens: settings.rag.max_prompt_tokens,
        max_history_messages: settings.rag.max_history_messages,
        min_passage_tokens: settings.rag.min_passage_tokens,
    }));

    let engine = Arc::new(GenerationEngine::new(
        llm_client,
        GenerationParams {
            max_tokens: settings.llm.max_tokens,
            temperature: settings.llm.temperature,
            top_p: settings.llm.top_p,
            top_k: settings.llm.top_k,
            stop_sequences: settings.llm.stop_sequences.clone(),
        },
        GenerationSettings {
            first_token_timeout: Duration::from_millis(settings.llm.first_token_timeout_ms),
            idle_timeout: Duration::from_millis(settings.llm.idle_timeout_ms),
            buffer_size: settings.llm.stream_buffer,
        },
    ));

    let chat_service = Arc::new(ChatService::new(
        Arc::clone(&conversations),
        Arc::clone(&document_index),
        composer,
        engine,
        ChatSettings {
            top_k: settings.rag.top_k,
            similarity_threshold: settings.rag.similarity_threshold,
            event_buffer: settings.llm.stream_buffer,
        },
    ));

    let sessions = Arc::new(SessionGateway::new(
        users,
        PasswordHasher::new(settings.session.password_iterations),
        chrono::Duration::minutes(settings.session.ttl_minutes),
    ));
    let seeded = sessions
        .seed(&settings.session.users)
        .await
        .context("Failed to create configured users")?;
    tracing::info!(seeded, configured = settings.session.users.len(), "Configured users ready");

    let state = AppState {
        chat_service,
        conversations,
        document_index,
        sessions,
        cookie_secure: settings.session.cookie_secure,
    };

    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    tracing::info!(%addr, environment = %environment, "Listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
