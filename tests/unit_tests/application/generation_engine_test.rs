use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ragchat::application::ports::LlmClient;
use ragchat::application::services::{
    GenerationEngine, GenerationError, GenerationSettings, StopSequenceFilter, StreamDispatcher,
    Termination, TokenStream,
};
use ragchat::domain::{GenerationParams, Prompt, PromptMessage, PromptRole, StreamEvent};
use ragchat::infrastructure::llm::MockLlmClient;

fn prompt() -> Prompt {
    Prompt::new(vec![
        PromptMessage::new(PromptRole::System, "system"),
        PromptMessage::new(PromptRole::User, "question"),
    ])
}

fn engine_with(client: MockLlmClient, params: GenerationParams, settings: GenerationSettings) -> GenerationEngine {
    let client: Arc<dyn LlmClient> = Arc::new(client);
    GenerationEngine::new(client, params, settings)
}

fn engine(client: MockLlmClient) -> GenerationEngine {
    engine_with(client, GenerationParams::default(), GenerationSettings::default())
}

async fn drain(mut stream: TokenStream) -> (Vec<String>, Option<GenerationError>) {
    let mut tokens = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => return (tokens, Some(e)),
        }
    }
    (tokens, None)
}

#[tokio::test]
async fn given_scripted_model_when_generating_then_tokens_arrive_in_order() {
    let engine = engine(MockLlmClient::new(["The", " answer", " is", " 42."]));

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert_eq!(tokens, vec!["The", " answer", " is", " 42."]);
    assert!(error.is_none());
}

#[tokio::test]
async fn given_model_failing_mid_stream_when_generating_then_error_follows_delivered_tokens() {
    let engine = engine(MockLlmClient::new(["Hel", "lo", " world"]).with_failure_after(2));
    let mut stream = engine.generate(prompt(), CancellationToken::new());

    assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
    assert_eq!(stream.next().await.unwrap().unwrap(), "lo");
    assert!(matches!(stream.next().await, Some(Err(GenerationError::Model(_)))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn given_model_failing_to_start_when_generating_then_single_model_error() {
    let engine = engine(MockLlmClient::new(["unused"]).failing_to_start());

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert!(tokens.is_empty());
    assert!(matches!(error, Some(GenerationError::Model(_))));
}

#[tokio::test]
async fn given_stop_sequence_split_across_tokens_when_generating_then_output_ends_before_it() {
    let params = GenerationParams {
        stop_sequences: vec!["###".to_string()],
        ..GenerationParams::default()
    };
    let client = MockLlmClient::new(["Hello", " wor", "ld#", "##", " ignored"]);
    let engine = engine_with(client, params, GenerationSettings::default());

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert_eq!(tokens.concat(), "Hello world");
    assert!(tokens.iter().all(|t| !t.contains('#')));
    assert!(error.is_none());
}

#[tokio::test]
async fn given_max_tokens_when_generating_then_output_is_capped() {
    let params = GenerationParams {
        max_tokens: 3,
        ..GenerationParams::default()
    };
    let engine = engine_with(
        MockLlmClient::new(["a", "b", "c", "d", "e"]),
        params,
        GenerationSettings::default(),
    );

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert_eq!(tokens, vec!["a", "b", "c"]);
    assert!(error.is_none());
}

#[tokio::test]
async fn given_empty_tokens_when_generating_then_they_are_not_emitted() {
    let engine = engine(MockLlmClient::new(["a", "", "b"]));

    let (tokens, _) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert_eq!(tokens, vec!["a", "b"]);
}

#[tokio::test]
async fn given_model_that_never_starts_when_first_token_window_passes_then_timeout() {
    let settings = GenerationSettings {
        first_token_timeout: Duration::from_millis(50),
        idle_timeout: Duration::from_secs(5),
        buffer_size: 4,
    };
    let engine = engine_with(
        MockLlmClient::new(["never"]).stalling_after(0),
        GenerationParams::default(),
        settings,
    );

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert!(tokens.is_empty());
    assert!(matches!(error, Some(GenerationError::Timeout(d)) if d == Duration::from_millis(50)));
}

#[tokio::test]
async fn given_slow_start_and_slow_first_token_when_together_over_window_then_timeout() {
    let settings = GenerationSettings {
        first_token_timeout: Duration::from_millis(500),
        idle_timeout: Duration::from_secs(5),
        buffer_size: 4,
    };
    let client = MockLlmClient::new(["late"])
        .with_start_delay(Duration::from_millis(350))
        .with_token_delay(Duration::from_millis(350));
    let engine = engine_with(client, GenerationParams::default(), settings);

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert!(tokens.is_empty());
    assert!(matches!(error, Some(GenerationError::Timeout(d)) if d == Duration::from_millis(500)));
}

#[tokio::test]
async fn given_slow_start_within_window_when_first_token_follows_then_it_is_delivered() {
    let settings = GenerationSettings {
        first_token_timeout: Duration::from_millis(1000),
        idle_timeout: Duration::from_secs(5),
        buffer_size: 4,
    };
    let client = MockLlmClient::new(["on time"])
        .with_start_delay(Duration::from_millis(100))
        .with_token_delay(Duration::from_millis(100));
    let engine = engine_with(client, GenerationParams::default(), settings);

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert_eq!(tokens, vec!["on time"]);
    assert!(error.is_none());
}

#[tokio::test]
async fn given_model_stalling_mid_answer_when_idle_window_passes_then_timeout_after_tokens() {
    let settings = GenerationSettings {
        first_token_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_millis(50),
        buffer_size: 4,
    };
    let engine = engine_with(
        MockLlmClient::new(["first", "second"]).stalling_after(1),
        GenerationParams::default(),
        settings,
    );

    let (tokens, error) = drain(engine.generate(prompt(), CancellationToken::new())).await;

    assert_eq!(tokens, vec!["first"]);
    assert!(matches!(error, Some(GenerationError::Timeout(d)) if d == Duration::from_millis(50)));
}

#[tokio::test]
async fn given_running_generation_when_cancelled_then_stream_ends_early() {
    let script: Vec<String> = (0..100).map(|i| format!("t{i} ")).collect();
    let engine = engine(MockLlmClient::new(script).with_token_delay(Duration::from_millis(10)));
    let mut stream = engine.generate(prompt(), CancellationToken::new());

    assert!(stream.next().await.unwrap().is_ok());
    stream.cancel();

    let rest = tokio::time::timeout(Duration::from_secs(2), async {
        let mut count = 0;
        while stream.next().await.is_some() {
            count += 1;
        }
        count
    })
    .await
    .expect("stream should end after cancellation");

    assert!(rest < 99);
    assert!(stream.is_cancelled());
}

#[tokio::test]
async fn given_token_stream_when_dropped_then_generation_is_cancelled() {
    let cancel = CancellationToken::new();
    let engine = engine(MockLlmClient::new(["a", "b", "c"]).with_token_delay(Duration::from_millis(20)));
    let mut stream = engine.generate(prompt(), cancel.clone());

    let _ = stream.next().await;
    drop(stream);

    assert!(cancel.is_cancelled());
}

#[test]
fn given_partial_stop_prefix_when_filtering_then_it_is_held_back_until_disambiguated() {
    let mut filter = StopSequenceFilter::new(vec!["END".to_string()]);

    let first = filter.push("abcE");
    assert_eq!(first.text, "abc");
    assert!(!first.stopped);

    let second = filter.push("x");
    assert_eq!(second.text, "Ex");
    assert!(!second.stopped);
}

#[test]
fn given_stop_sequence_when_filtering_then_text_before_it_is_released_and_rest_discarded() {
    let mut filter = StopSequenceFilter::new(vec!["END".to_string()]);

    assert_eq!(filter.push("fooE").text, "foo");
    let step = filter.push("ND tail");
    assert_eq!(step.text, "");
    assert!(step.stopped);
    assert!(filter.push("more").stopped);
    assert_eq!(filter.finish(), "");
}

#[test]
fn given_held_back_prefix_when_finishing_then_it_is_released() {
    let mut filter = StopSequenceFilter::new(vec!["END".to_string()]);

    assert_eq!(filter.push("closing EN").text, "closing ");
    assert_eq!(filter.finish(), "EN");
}

#[tokio::test]
async fn given_listening_consumer_when_forwarding_then_outcome_is_completed_with_full_text() {
    let engine = engine(MockLlmClient::new(["Hel", "lo"]));
    let (sink, mut events) = mpsc::channel(8);

    let outcome = StreamDispatcher::forward(engine.generate(prompt(), CancellationToken::new()), sink).await;

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.text, "Hello");
    assert_eq!(events.recv().await, Some(StreamEvent::Token("Hel".to_string())));
    assert_eq!(events.recv().await, Some(StreamEvent::Token("lo".to_string())));
    assert_eq!(events.recv().await, None);
}

#[tokio::test]
async fn given_model_error_when_forwarding_then_error_event_is_last_and_outcome_failed() {
    let engine = engine(MockLlmClient::new(["Hel", "lo", "!"]).with_failure_after(2));
    let (sink, mut events) = mpsc::channel(8);

    let outcome = StreamDispatcher::forward(engine.generate(prompt(), CancellationToken::new()), sink).await;

    assert_eq!(outcome.text, "Hello");
    assert!(matches!(outcome.termination, Termination::Failed(_)));
    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }
    assert_eq!(received.len(), 3);
    assert!(received[2].is_error());
}

#[tokio::test]
async fn given_consumer_gone_when_forwarding_then_generation_is_cancelled() {
    let cancel = CancellationToken::new();
    let engine = engine(MockLlmClient::new(["a", "b", "c"]).with_token_delay(Duration::from_millis(20)));
    let (sink, events) = mpsc::channel(8);
    drop(events);

    let outcome = StreamDispatcher::forward(engine.generate(prompt(), cancel.clone()), sink).await;

    assert_eq!(outcome.termination, Termination::Disconnected);
    assert!(outcome.text.is_empty());
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn given_cancel_before_first_token_when_forwarding_then_outcome_is_stopped() {
    let cancel = CancellationToken::new();
    let engine = engine(MockLlmClient::new(["a", "b"]).with_token_delay(Duration::from_millis(50)));
    let tokens = engine.generate(prompt(), cancel.clone());
    cancel.cancel();
    let (sink, _events) = mpsc::channel(8);

    let outcome = StreamDispatcher::forward(tokens, sink).await;

    assert_eq!(outcome.termination, Termination::Stopped);
    assert!(outcome.text.is_empty());
}
