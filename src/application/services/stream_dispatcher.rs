use futures::StreamExt;
use tokio::sync::mpsc;

use super::generation_engine::TokenStream;
use crate::domain::StreamEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed,
    /// Generation was cancelled through an explicit stop request.
    Stopped,
    /// The consumer went away; generation was cancelled.
    Disconnected,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Text of every token the consumer received, in order.
    pub text: String,
    pub termination: Termination,
}

/// Pumps a generation into a client-bound event channel.
pub struct StreamDispatcher;

impl StreamDispatcher {
    pub async fn forward(mut tokens: TokenStream, sink: mpsc::Sender<StreamEvent>) -> DispatchOutcome {
        let mut text = String::new();
        let mut delivered = 0usize;

        let termination = loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => {
                    tokens.cancel();
                    break Termination::Disconnected;
                }
                next = tokens.next() => next,
            };

            match next {
                None if tokens.is_cancelled() => break Termination::Stopped,
                None => break Termination::Completed,
                Some(Ok(token)) => {
                    if sink.send(StreamEvent::Token(token.clone())).await.is_err() {
                        tokens.cancel();
                        break Termination::Disconnected;
                    }
                    delivered += 1;
                    text.push_str(&token);
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    if sink.send(StreamEvent::Error(message.clone())).await.is_err() {
                        tracing::debug!("Consumer gone before error event could be delivered");
                    }
                    break Termination::Failed(message);
                }
            }
        };

        tracing::debug!(tokens = delivered, termination = ?termination, "Dispatch finished");
        DispatchOutcome { text, termination }
    }
}
