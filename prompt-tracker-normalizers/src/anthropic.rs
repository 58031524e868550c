use std::collections::HashMap;

use prompt_tracker_core::{
    ApiTarget, CodeInterpreterResult, ConversationMessage, NormalizedConversation,
    NormalizedResponse, Role, ToolCall, WebSearchResult, WebSource,
};
use serde_json::{Map, Value};

use crate::extract::{
    array_field, content_text, explicit_turn, finish_messages, messages_of, pick_metadata,
    role_of, str_field, string_field, tool_call_from, tool_calls_of, usage_of,
};
use crate::Normalizer;

const RESPONSE_METADATA_KEYS: &[&str] = &["id", "model", "stop_reason"];

/// Anthropic Messages API.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicMessagesNormalizer;

/// What a list of content blocks carries once split by block type.
#[derive(Debug, Default)]
struct Blocks {
    texts: Vec<String>,
    tool_calls: Vec<ToolCall>,
    web_search_results: Vec<WebSearchResult>,
    code_interpreter_results: Vec<CodeInterpreterResult>,
    tool_results: Vec<(Option<String>, String)>,
    other_blocks: usize,
}

impl Blocks {
    fn read(blocks: &[Value]) -> Self {
        let mut parsed = Blocks::default();
        let mut server_calls: HashMap<&str, &Value> = HashMap::new();

        for block in blocks {
            match str_field(block, "type") {
                Some("text") => parsed.texts.extend(str_field(block, "text").map(str::to_string)),
                Some("tool_use") => parsed.tool_calls.push(tool_call_from(block)),
                Some("server_tool_use") => {
                    if let Some(id) = str_field(block, "id") {
                        server_calls.insert(id, block);
                    }
                }
                Some("web_search_tool_result") => {
                    let call = tool_use_id(block).and_then(|id| server_calls.get(id).copied());
                    parsed.web_search_results.push(web_search_from(block, call));
                }
                Some("code_execution_tool_result" | "bash_code_execution_tool_result") => {
                    let call = tool_use_id(block).and_then(|id| server_calls.get(id).copied());
                    parsed.code_interpreter_results.push(code_execution_from(block, call));
                }
                Some("tool_result") => parsed
                    .tool_results
                    .push((string_field(block, "tool_use_id"), content_text(block.get("content")))),
                _ => parsed.other_blocks += 1,
            }
        }
        parsed
    }

    fn text(&self) -> String {
        self.texts.join("\n")
    }

    /// A user turn made only of tool results is tool output, not a new
    /// question.
    fn is_tool_output(&self) -> bool {
        !self.tool_results.is_empty()
            && self.texts.is_empty()
            && self.tool_calls.is_empty()
            && self.other_blocks == 0
    }
}

fn tool_use_id(block: &Value) -> Option<&str> {
    str_field(block, "tool_use_id")
}

fn web_search_from(block: &Value, call: Option<&Value>) -> WebSearchResult {
    let input = call.and_then(|c| c.get("input")).unwrap_or(&Value::Null);
    let (status, sources) = match block.get("content") {
        Some(Value::Array(results)) => (
            "completed",
            results
                .iter()
                .filter_map(|r| {
                    str_field(r, "url").map(|url| WebSource {
                        url: url.to_string(),
                        title: str_field(r, "title").map(str::to_string),
                    })
                })
                .collect(),
        ),
        _ => ("failed", Vec::new()),
    };
    WebSearchResult {
        id: string_field(block, "tool_use_id"),
        status: Some(status.to_string()),
        query: str_field(input, "query").map(str::to_string),
        sources,
    }
}

fn code_execution_from(block: &Value, call: Option<&Value>) -> CodeInterpreterResult {
    let input = call.and_then(|c| c.get("input")).unwrap_or(&Value::Null);
    let (code, language) = match (str_field(input, "code"), str_field(input, "command")) {
        (Some(code), _) => (code, "python"),
        (None, Some(command)) => (command, "bash"),
        (None, None) => ("", "python"),
    };
    let content = block.get("content").unwrap_or(&Value::Null);
    let error_code = str_field(content, "error_code").map(str::to_string);
    let return_code = content.get("return_code").and_then(Value::as_i64);
    let stderr = str_field(content, "stderr").filter(|s| !s.is_empty());

    let error = error_code.or_else(|| match return_code {
        Some(code) if code != 0 => Some(
            stderr
                .map(str::to_string)
                .unwrap_or_else(|| format!("exited with status {}", code)),
        ),
        _ => None,
    });

    CodeInterpreterResult {
        id: string_field(block, "tool_use_id"),
        status: Some(if error.is_some() { "failed" } else { "completed" }.to_string()),
        language: Some(language.to_string()),
        code: code.to_string(),
        output: str_field(content, "stdout").map(str::to_string),
        files_created: array_field(content, "content")
            .iter()
            .filter_map(|f| str_field(f, "file_id"))
            .map(str::to_string)
            .collect(),
        error,
    }
}

impl Normalizer for AnthropicMessagesNormalizer {
    fn target(&self) -> ApiTarget {
        ApiTarget::ANTHROPIC_MESSAGES
    }

    fn normalize_single_response(&self, raw: &Value) -> NormalizedResponse {
        let mut metadata = pick_metadata(raw, RESPONSE_METADATA_KEYS);
        if let Some(usage) = usage_of(raw) {
            metadata.insert("usage".to_string(), serde_json::to_value(usage).unwrap_or_default());
        }

        match raw {
            Value::String(text) => NormalizedResponse::from_text(text.clone()),
            _ => match raw.get("content") {
                Some(Value::Array(blocks)) => {
                    let blocks = Blocks::read(blocks);
                    NormalizedResponse {
                        text: blocks.text(),
                        tool_calls: blocks.tool_calls,
                        web_search_results: blocks.web_search_results,
                        file_search_results: Vec::new(),
                        code_interpreter_results: blocks.code_interpreter_results,
                        metadata,
                    }
                }
                _ => NormalizedResponse {
                    text: str_field(raw, "text")
                        .map(str::to_string)
                        .unwrap_or_else(|| content_text(raw.get("content"))),
                    tool_calls: tool_calls_of(raw),
                    metadata,
                    ..Default::default()
                },
            },
        }
    }

    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation {
        let mut messages = Vec::new();

        let system = content_text(raw.get("system"));
        if !system.is_empty() {
            messages.push((ConversationMessage::new(Role::System, system, 1), None));
        }

        for value in messages_of(raw) {
            let turn = explicit_turn(value);
            let message = match value.get("content") {
                Some(Value::Array(blocks)) => {
                    let blocks = Blocks::read(blocks);
                    let mut api_metadata = pick_metadata(value, RESPONSE_METADATA_KEYS);
                    let role = if role_of(value) == Role::User && blocks.is_tool_output() {
                        if let Some((Some(id), _)) = blocks.tool_results.first() {
                            api_metadata.insert("tool_use_id".to_string(), Value::from(id.clone()));
                        }
                        Role::Tool
                    } else {
                        role_of(value)
                    };
                    let text = if role == Role::Tool {
                        blocks
                            .tool_results
                            .iter()
                            .map(|(_, content)| content.as_str())
                            .collect::<Vec<_>>()
                            .join("\n")
                    } else {
                        blocks.text()
                    };
                    ConversationMessage::new(role, text, 1)
                        .with_tool_calls(blocks.tool_calls)
                        .with_web_search_results(blocks.web_search_results)
                        .with_code_interpreter_results(blocks.code_interpreter_results)
                        .with_api_metadata(api_metadata)
                }
                _ => ConversationMessage::new(role_of(value), content_text(value.get("content")), 1)
                    .with_tool_calls(tool_calls_of(value))
                    .with_api_metadata(Map::new()),
            };
            messages.push((message.with_usage(usage_of(value)), turn));
        }

        let mut conversation = NormalizedConversation::from_messages(finish_messages(messages));
        conversation.metadata = pick_metadata(raw, &["model"]);
        conversation
    }
}
