use crate::application::ports::SearchResult;
use crate::domain::{Message, MessageRole, Prompt, PromptMessage, PromptRole};

use super::document_index::compare_results;
use super::token_counter::{count_tokens, truncate_to_last_tokens, truncate_to_tokens};

const CONTEXT_HEADER: &str = "\n\nAnswer using the following context when it is relevant:\n\n";
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";
// Chat templates add a few tokens of framing per message.
const PER_MESSAGE_OVERHEAD: usize = 4;

#[derive(Debug, Clone)]
pub struct PromptComposerSettings {
    pub system_instruction: String,
    pub max_prompt_tokens: usize,
    pub max_history_messages: usize,
    pub min_passage_tokens: usize,
}

/// Builds a prompt that never exceeds `max_prompt_tokens`: system instruction,
/// then retrieved passages, then as much recent history as fits. The current
/// question is always kept, cut to its newest text if it alone is too long.
pub struct PromptComposer {
    settings: PromptComposerSettings,
}

impl PromptComposer {
    pub fn new(settings: PromptComposerSettings) -> Self {
        Self { settings }
    }

    /// Largest question, in tokens, that fits next to the system instruction.
    pub fn question_budget(&self) -> usize {
        self.settings
            .max_prompt_tokens
            .saturating_sub(2 * PER_MESSAGE_OVERHEAD)
            .saturating_sub(count_tokens(&self.settings.system_instruction))
    }

    pub fn compose(&self, history: &[Message], question: &str, passages: &[SearchResult]) -> Prompt {
        let budget = self.settings.max_prompt_tokens;
        let framing = 2 * PER_MESSAGE_OVERHEAD;

        let system = truncate_to_tokens(&self.settings.system_instruction, budget.saturating_sub(framing));
        let question_room = budget.saturating_sub(framing + count_tokens(system));
        let kept_question = truncate_to_last_tokens(question, question_room);
        if kept_question.len() < question.len() {
            tracing::warn!(
                question_tokens = count_tokens(question),
                kept_tokens = question_room,
                "Question cut to fit the prompt budget"
            );
        }
        let question = kept_question;

        let mut used = count_tokens(system) + count_tokens(question) + framing;

        let mut system_content = system.to_string();
        let context = self.select_passages(passages, &mut used, budget);
        if !context.is_empty() {
            system_content.push_str(CONTEXT_HEADER);
            system_content.push_str(&context.join(PASSAGE_SEPARATOR));
        }

        let turns = self.select_history(history, &mut used, budget);

        let mut messages = Vec::with_capacity(turns.len() + 2);
        messages.push(PromptMessage::new(PromptRole::System, system_content));
        messages.extend(turns);
        messages.push(PromptMessage::new(PromptRole::User, question));

        tracing::debug!(
            prompt_tokens = used,
            budget = budget,
            passages = context.len(),
            messages = messages.len(),
            "Prompt composed"
        );
        Prompt::new(messages)
    }

    fn select_passages(&self, passages: &[SearchResult], used: &mut usize, budget: usize) -> Vec<String> {
        let mut ranked: Vec<&SearchResult> = passages.iter().collect();
        ranked.sort_by(|a, b| compare_results(a, b));

        let header_cost = count_tokens(CONTEXT_HEADER);
        let separator_cost = count_tokens(PASSAGE_SEPARATOR);
        let mut selected: Vec<String> = Vec::new();

        for passage in ranked {
            let framing = if selected.is_empty() { header_cost } else { separator_cost };
            let attribution = format!("[source: {}]\n", passage.chunk.source);
            let fixed_cost = framing + count_tokens(&attribution);
            let text_cost = count_tokens(&passage.chunk.text);

            if *used + fixed_cost + text_cost <= budget {
                *used += fixed_cost + text_cost;
                selected.push(format!("{}{}", attribution, passage.chunk.text));
                continue;
            }

            let remaining = budget.saturating_sub(*used + fixed_cost);
            if remaining >= self.settings.min_passage_tokens {
                let truncated = truncate_to_tokens(&passage.chunk.text, remaining);
                *used += fixed_cost + count_tokens(truncated);
                selected.push(format!("{}{}", attribution, truncated));
            }
            // Everything ranked below this one is dropped.
            break;
        }

        selected
    }

    fn select_history(&self, history: &[Message], used: &mut usize, budget: usize) -> Vec<PromptMessage> {
        let start = history.len().saturating_sub(self.settings.max_history_messages);
        let mut kept = Vec::new();

        for message in history[start..].iter().rev() {
            let cost = count_tokens(&message.content) + PER_MESSAGE_OVERHEAD;
            if *used + cost > budget {
                break;
            }
            *used += cost;
            let role = match message.role {
                MessageRole::User => PromptRole::User,
                MessageRole::Assistant => PromptRole::Assistant,
            };
            kept.push(PromptMessage::new(role, message.content.clone()));
        }

        kept.reverse();
        kept
    }
}
