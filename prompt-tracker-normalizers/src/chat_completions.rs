use prompt_tracker_core::{ApiTarget, NormalizedConversation, NormalizedResponse, Role};
use serde_json::{Map, Value};

use crate::extract::{
    base_message, content_text, finish_messages, messages_of, pick_metadata, str_field,
    tool_calls_of, usage_of,
};
use crate::Normalizer;

/// OpenAI Chat Completions, and the OpenAI-compatible Google endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ChatCompletionsNormalizer {
    target: ApiTarget,
}

impl ChatCompletionsNormalizer {
    pub fn new(target: ApiTarget) -> Self {
        Self { target }
    }
}

impl Default for ChatCompletionsNormalizer {
    fn default() -> Self {
        Self::new(ApiTarget::OPENAI_CHAT_COMPLETIONS)
    }
}

impl Normalizer for ChatCompletionsNormalizer {
    fn target(&self) -> ApiTarget {
        self.target
    }

    fn normalize_single_response(&self, raw: &Value) -> NormalizedResponse {
        if let Value::String(text) = raw {
            return NormalizedResponse::from_text(text.clone());
        }

        let choice = raw
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first());

        let mut metadata = pick_metadata(raw, &["id", "model"]);
        if let Some(usage) = usage_of(raw) {
            metadata.insert("usage".to_string(), serde_json::to_value(usage).unwrap_or_default());
        }

        match choice {
            Some(choice) => {
                let message = choice.get("message").unwrap_or(&Value::Null);
                if let Some(reason) = str_field(choice, "finish_reason") {
                    metadata.insert("finish_reason".to_string(), Value::from(reason));
                }
                NormalizedResponse {
                    text: content_text(message.get("content")),
                    tool_calls: tool_calls_of(message),
                    metadata,
                    ..Default::default()
                }
            }
            // Client wrapper: {text, tool_calls, usage, model}
            None => {
                metadata.extend(pick_metadata(raw, &["finish_reason"]));
                NormalizedResponse {
                    text: str_field(raw, "text")
                        .map(str::to_string)
                        .unwrap_or_else(|| content_text(raw.get("content"))),
                    tool_calls: tool_calls_of(raw),
                    metadata,
                    ..Default::default()
                }
            }
        }
    }

    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation {
        let messages = messages_of(raw)
            .iter()
            .map(|value| {
                let (message, turn) = base_message(value);
                let mut api_metadata = Map::new();
                if message.role == Role::Tool {
                    api_metadata.extend(pick_metadata(value, &["tool_call_id", "name"]));
                }
                api_metadata.extend(pick_metadata(value, &["finish_reason"]));
                (message.with_api_metadata(api_metadata), turn)
            })
            .collect();

        let mut conversation = NormalizedConversation::from_messages(finish_messages(messages));
        conversation.metadata = pick_metadata(raw, &["model", "id"]);
        conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_single_response_from_choices() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let response = ChatCompletionsNormalizer::default().normalize_single_response(&raw);
        assert_eq!(response.text, "");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments, json!({"city": "Oslo"}));
        assert_eq!(response.metadata["finish_reason"], json!("tool_calls"));
        assert_eq!(response.metadata["usage"]["total_tokens"], json!(15));
    }

    #[test]
    fn test_single_response_wrapper_shape() {
        let raw = json!({"text": "hello", "model": "gpt-4o-mini"});
        let response = ChatCompletionsNormalizer::default().normalize_single_response(&raw);
        assert_eq!(response.text, "hello");
        assert_eq!(response.metadata["model"], json!("gpt-4o-mini"));
    }

    #[test]
    fn test_missing_fields_degrade() {
        let response = ChatCompletionsNormalizer::default().normalize_single_response(&json!({}));
        assert_eq!(response, NormalizedResponse::default());

        let conversation = ChatCompletionsNormalizer::default().normalize_conversation(&json!(null));
        assert!(conversation.messages.is_empty());
    }

    #[test]
    fn test_tool_message_keeps_call_id() {
        let raw = json!([
            {"role": "user", "content": "weather?"},
            {"role": "assistant", "content": "", "tool_calls": [
                {"id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{}"}}
            ]},
            {"role": "tool", "tool_call_id": "call_1", "content": "sunny"},
            {"role": "assistant", "content": "It is sunny."}
        ]);

        let conversation = ChatCompletionsNormalizer::default().normalize_conversation(&raw);
        assert_eq!(conversation.messages[2].role, Role::Tool);
        assert_eq!(conversation.messages[2].api_metadata["tool_call_id"], json!("call_1"));
        assert_eq!(conversation.tool_usage.len(), 1);
        assert_eq!(conversation.tool_usage[0].message_index, 1);
        assert_eq!(conversation.response_text(), "It is sunny.");
    }
}
