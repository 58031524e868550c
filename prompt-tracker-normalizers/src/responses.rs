use prompt_tracker_core::{
    ApiTarget, ConversationMessage, NormalizedConversation, NormalizedResponse, WebSearchResult,
    WebSource,
};
use serde_json::{Map, Value};

use crate::extract::{
    array_field, base_message, code_interpreter_result_from, file_search_result_from,
    finish_messages, messages_of, pick_metadata, str_field, tool_call_from, tool_calls_of,
    usage_of, web_search_result_from,
};
use crate::Normalizer;

const RESPONSE_METADATA_KEYS: &[&str] = &["id", "model", "status", "previous_response_id"];

/// OpenAI Responses API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesNormalizer;

impl Normalizer for ResponsesNormalizer {
    fn target(&self) -> ApiTarget {
        ApiTarget::OPENAI_RESPONSES
    }

    fn normalize_single_response(&self, raw: &Value) -> NormalizedResponse {
        match raw {
            Value::String(text) => NormalizedResponse::from_text(text.clone()),
            _ if raw.get("output").is_some_and(Value::is_array) => from_output(raw),
            _ => from_wrapper(raw),
        }
    }

    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation {
        let messages = messages_of(raw)
            .iter()
            .map(|value| {
                let (message, turn) = base_message(value);
                (with_embedded_response(message, value), turn)
            })
            .collect();

        let mut conversation = NormalizedConversation::from_messages(finish_messages(messages));
        conversation.web_search_results = array_field(raw, "web_search_results")
            .iter()
            .map(web_search_result_from)
            .collect();
        conversation.file_search_results = array_field(raw, "file_search_results")
            .iter()
            .map(file_search_result_from)
            .collect();
        conversation.code_interpreter_results = array_field(raw, "code_interpreter_results")
            .iter()
            .map(code_interpreter_result_from)
            .collect();
        conversation.metadata = pick_metadata(raw, &["model", "previous_response_id"]);
        conversation
    }
}

/// Folds a raw Responses payload carried by a conversation entry (either
/// under `response` or as an inline `output` array) into the message.
fn with_embedded_response(mut message: ConversationMessage, value: &Value) -> ConversationMessage {
    let embedded = match value.get("response") {
        Some(response) if response.is_object() => response,
        _ if value.get("output").is_some_and(Value::is_array) => value,
        _ => return message,
    };

    let response = from_output(embedded);
    if message.content.is_empty() {
        message.content = response.text;
    }
    message.tool_calls.extend(response.tool_calls);
    message.web_search_results.extend(response.web_search_results);
    message.file_search_results.extend(response.file_search_results);
    message
        .code_interpreter_results
        .extend(response.code_interpreter_results);
    if message.usage.is_none() {
        message.usage = usage_of(embedded);
    }

    let mut api_metadata = Map::new();
    if let Some(id) = str_field(embedded, "id").or_else(|| str_field(value, "response_id")) {
        api_metadata.insert("response_id".to_string(), Value::from(id));
    }
    api_metadata.extend(pick_metadata(embedded, &["previous_response_id"]));
    message.api_metadata.extend(api_metadata);
    message
}

fn from_output(raw: &Value) -> NormalizedResponse {
    let mut response = NormalizedResponse {
        metadata: response_metadata(raw),
        ..Default::default()
    };
    let mut texts = Vec::new();
    let mut citations = Vec::new();

    for item in array_field(raw, "output") {
        match str_field(item, "type") {
            Some("message") => {
                for part in array_field(item, "content") {
                    if matches!(str_field(part, "type"), Some("output_text" | "text")) {
                        texts.extend(str_field(part, "text").map(str::to_string));
                    }
                    citations.extend(
                        array_field(part, "annotations")
                            .iter()
                            .filter(|a| str_field(a, "type") == Some("url_citation"))
                            .filter_map(|a| {
                                str_field(a, "url").map(|url| WebSource {
                                    url: url.to_string(),
                                    title: str_field(a, "title").map(str::to_string),
                                })
                            }),
                    );
                }
            }
            Some("function_call") => response.tool_calls.push(tool_call_from(item)),
            Some("web_search_call") => response.web_search_results.push(web_search_result_from(item)),
            Some("file_search_call") => response
                .file_search_results
                .push(file_search_result_from(item)),
            Some("code_interpreter_call") => response
                .code_interpreter_results
                .push(code_interpreter_result_from(item)),
            _ => {}
        }
    }

    response.text = if texts.is_empty() {
        str_field(raw, "output_text").unwrap_or_default().to_string()
    } else {
        texts.join("\n")
    };
    fold_citations(&mut response.web_search_results, citations);
    response
}

fn from_wrapper(raw: &Value) -> NormalizedResponse {
    NormalizedResponse {
        text: str_field(raw, "text")
            .or_else(|| str_field(raw, "output_text"))
            .unwrap_or_default()
            .to_string(),
        tool_calls: tool_calls_of(raw),
        web_search_results: array_field(raw, "web_search_results")
            .iter()
            .map(web_search_result_from)
            .collect(),
        file_search_results: array_field(raw, "file_search_results")
            .iter()
            .map(file_search_result_from)
            .collect(),
        code_interpreter_results: array_field(raw, "code_interpreter_results")
            .iter()
            .map(code_interpreter_result_from)
            .collect(),
        metadata: response_metadata(raw),
    }
}

fn response_metadata(raw: &Value) -> Map<String, Value> {
    let mut metadata = pick_metadata(raw, RESPONSE_METADATA_KEYS);
    if let Some(usage) = usage_of(raw) {
        metadata.insert("usage".to_string(), serde_json::to_value(usage).unwrap_or_default());
    }
    metadata
}

/// Cited URLs the search call did not list are appended to the last search
/// of the turn.
fn fold_citations(results: &mut [WebSearchResult], citations: Vec<WebSource>) {
    let Some(last) = results.last_mut() else {
        return;
    };
    for citation in citations {
        if !last.sources.iter().any(|s| s.url == citation.url) {
            last.sources.push(citation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_response() -> Value {
        json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "status": "completed",
            "output": [
                {
                    "type": "web_search_call",
                    "id": "ws_1",
                    "status": "completed",
                    "action": {
                        "type": "search",
                        "query": "rust async runtimes",
                        "sources": [{"type": "url", "url": "https://tokio.rs/"}]
                    }
                },
                {
                    "type": "message",
                    "role": "assistant",
                    "content": [{
                        "type": "output_text",
                        "text": "Tokio is the most used runtime.",
                        "annotations": [
                            {"type": "url_citation", "url": "https://tokio.rs/", "title": "Tokio"},
                            {"type": "url_citation", "url": "https://docs.rs/async-std", "title": "async-std"}
                        ]
                    }]
                }
            ],
            "usage": {"input_tokens": 12, "output_tokens": 30}
        })
    }

    #[test]
    fn test_output_items() {
        let response = ResponsesNormalizer.normalize_single_response(&sample_response());

        assert_eq!(response.text, "Tokio is the most used runtime.");
        assert_eq!(response.web_search_results.len(), 1);
        let search = &response.web_search_results[0];
        assert_eq!(search.query.as_deref(), Some("rust async runtimes"));
        let urls: Vec<&str> = search.sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://tokio.rs/", "https://docs.rs/async-std"]);
        assert_eq!(response.metadata["usage"]["total_tokens"], json!(42));
    }

    #[test]
    fn test_output_text_fallback() {
        let raw = json!({"output": [], "output_text": "short answer"});
        assert_eq!(ResponsesNormalizer.normalize_single_response(&raw).text, "short answer");
    }

    #[test]
    fn test_conversation_embeds_raw_response() {
        let raw = json!({
            "messages": [
                {"role": "user", "content": "Which runtime?"},
                {"role": "assistant", "response": sample_response()}
            ],
            "code_interpreter_results": [{"id": "ci_1", "code": "print(1)", "status": "completed"}]
        });

        let conversation = ResponsesNormalizer.normalize_conversation(&raw);
        let assistant = &conversation.messages[1];
        assert_eq!(assistant.content, "Tokio is the most used runtime.");
        assert_eq!(assistant.turn, 1);
        assert_eq!(assistant.api_metadata["response_id"], json!("resp_1"));
        assert_eq!(conversation.all_web_search_results().len(), 1);
        assert_eq!(conversation.all_code_interpreter_results().len(), 1);
    }
}
