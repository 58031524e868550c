//! Raw provider payloads to the canonical conversation shape.
//!
//! One normalizer per (provider, api). All of them are pure synchronous
//! transforms over `serde_json::Value`: malformed or partial input degrades
//! to empty fields and never errors.

mod extract;

pub mod anthropic;
pub mod assistants;
pub mod chat_completions;
pub mod responses;

pub use anthropic::AnthropicMessagesNormalizer;
pub use assistants::AssistantsNormalizer;
pub use chat_completions::ChatCompletionsNormalizer;
pub use responses::ResponsesNormalizer;

use prompt_tracker_core::{
    Api, ApiTarget, EvaluationData, NormalizedConversation, NormalizedResponse, Provider,
};
use serde_json::Value;

pub trait Normalizer: Send + Sync {
    fn target(&self) -> ApiTarget;

    /// One provider response, no conversation context.
    fn normalize_single_response(&self, raw: &Value) -> NormalizedResponse;

    /// A full message history, optionally with provider side channels
    /// (run steps, tool results).
    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation;

    /// Picks the conversation or single-response path from the payload
    /// shape and wraps the result for evaluators.
    fn normalize(&self, raw: &Value) -> EvaluationData {
        match raw {
            Value::String(text) => EvaluationData::Text(text.clone()),
            Value::Array(_) => EvaluationData::Conversation(self.normalize_conversation(raw)),
            Value::Object(map) if map.contains_key("messages") => {
                EvaluationData::Conversation(self.normalize_conversation(raw))
            }
            _ => EvaluationData::Response(self.normalize_single_response(raw)),
        }
    }
}

/// The normalizer for `target`, or `None` when the pair is not supported.
pub fn normalizer_for(target: ApiTarget) -> Option<Box<dyn Normalizer>> {
    let normalizer: Box<dyn Normalizer> = match (target.provider, target.api) {
        (Provider::OpenAi | Provider::Google, Api::ChatCompletions) => {
            Box::new(ChatCompletionsNormalizer::new(target))
        }
        (Provider::OpenAi, Api::Responses) => Box::new(ResponsesNormalizer),
        (Provider::OpenAi, Api::Assistants) => Box::new(AssistantsNormalizer),
        (Provider::Anthropic, Api::Messages) => Box::new(AnthropicMessagesNormalizer),
        _ => {
            tracing::debug!("No normalizer for {}", target);
            return None;
        }
    };
    Some(normalizer)
}
