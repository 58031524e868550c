//! Lenient accessors over raw provider JSON.
//!
//! Nothing here fails: missing or mistyped fields come back as `None`, an
//! empty slice or an empty string.

use prompt_tracker_core::{
    assign_turns, CodeInterpreterResult, ConversationMessage, FileSearchHit, FileSearchResult,
    Role, TokenUsage, ToolCall, WebSearchResult, WebSource,
};
use serde_json::{Map, Value};

pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// First non-empty array among `keys`.
pub(crate) fn first_array<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .map(|key| array_field(value, key))
        .find(|items| !items.is_empty())
        .unwrap_or(&[])
}

/// The message list of a conversation payload: a bare array, or the
/// `messages` / `data` field of an object.
pub(crate) fn messages_of(raw: &Value) -> &[Value] {
    match raw {
        Value::Array(items) => items.as_slice(),
        _ => first_array(raw, &["messages", "data"]),
    }
}

pub(crate) fn explicit_turn(value: &Value) -> Option<u32> {
    value
        .get("turn")
        .and_then(Value::as_u64)
        .filter(|turn| *turn > 0)
        .map(|turn| turn.min(u32::MAX as u64) as u32)
}

pub(crate) fn role_of(value: &Value) -> Role {
    str_field(value, "role")
        .map(Role::from_provider)
        .unwrap_or(Role::Assistant)
}

/// Text of a content field: a plain string, or the concatenated text parts
/// of a content array (`text`, `output_text`, `input_text`, Assistants
/// `text.value`).
pub(crate) fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(part_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::Object(_)) => content.and_then(part_text).unwrap_or_default(),
        _ => String::new(),
    }
}

fn part_text(part: &Value) -> Option<String> {
    if let Value::String(text) = part {
        return Some(text.clone());
    }
    let kind = str_field(part, "type").unwrap_or("text");
    if !matches!(kind, "text" | "output_text" | "input_text") {
        return None;
    }
    match part.get("text") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(nested @ Value::Object(_)) => str_field(nested, "value").map(str::to_string),
        _ => None,
    }
}

/// Parses JSON-encoded tool arguments. A string that does not parse is
/// passed through as-is.
pub(crate) fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(text)) if text.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(text)) => match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Tool call arguments are not valid JSON, keeping raw string: {}", err);
                Value::String(text.clone())
            }
        },
        Some(other) => other.clone(),
        None => Value::Object(Map::new()),
    }
}

/// Accepts Chat Completions (`function: {name, arguments}`), Responses
/// (`call_id`, `name`, `arguments`), Anthropic (`name`, `input`) and the
/// canonical (`function_name`, `arguments`) spellings.
pub(crate) fn tool_call_from(value: &Value) -> ToolCall {
    let function = value.get("function");
    let name = function
        .and_then(|f| str_field(f, "name"))
        .or_else(|| str_field(value, "name"))
        .or_else(|| str_field(value, "function_name"))
        .map(str::to_string);
    let arguments = function
        .and_then(|f| f.get("arguments"))
        .or_else(|| value.get("arguments"))
        .or_else(|| value.get("input"));
    let call_type = match str_field(value, "type") {
        None | Some("function_call") | Some("tool_use") => "function",
        Some(other) => other,
    };
    ToolCall {
        id: string_field(value, "call_id").or_else(|| string_field(value, "id")),
        call_type: call_type.to_string(),
        function_name: name,
        arguments: parse_arguments(arguments),
    }
}

pub(crate) fn tool_calls_of(value: &Value) -> Vec<ToolCall> {
    array_field(value, "tool_calls").iter().map(tool_call_from).collect()
}

/// Token usage in either the Chat Completions or the Responses/Anthropic
/// naming.
pub(crate) fn usage_of(value: &Value) -> Option<TokenUsage> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    let prompt = usage
        .get("prompt_tokens")
        .or_else(|| usage.get("input_tokens"))
        .and_then(Value::as_u64);
    let completion = usage
        .get("completion_tokens")
        .or_else(|| usage.get("output_tokens"))
        .and_then(Value::as_u64);
    let total = usage
        .get("total_tokens")
        .and_then(Value::as_u64)
        .or_else(|| match (prompt, completion) {
            (Some(p), Some(c)) => Some(p.saturating_add(c)),
            _ => None,
        });
    let usage = TokenUsage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
    };
    (!usage.is_empty()).then_some(usage)
}

/// Copies the listed scalar fields into a metadata map when present.
pub(crate) fn pick_metadata(value: &Value, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| {
            value
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

fn source_from(value: &Value) -> Option<WebSource> {
    match value {
        Value::String(url) => Some(WebSource {
            url: url.clone(),
            title: None,
        }),
        _ => str_field(value, "url").map(|url| WebSource {
            url: url.to_string(),
            title: str_field(value, "title").map(str::to_string),
        }),
    }
}

/// Canonical web search records or Responses `web_search_call` items.
pub(crate) fn web_search_result_from(value: &Value) -> WebSearchResult {
    let action = value.get("action").unwrap_or(&Value::Null);
    let query = str_field(value, "query")
        .or_else(|| str_field(action, "query"))
        .map(str::to_string);
    let sources = [
        array_field(value, "sources"),
        array_field(action, "sources"),
        array_field(value, "results"),
    ]
    .into_iter()
    .find(|items| !items.is_empty())
    .unwrap_or(&[])
    .iter()
    .filter_map(source_from)
    .collect();

    WebSearchResult {
        id: string_field(value, "id"),
        status: string_field(value, "status"),
        query,
        sources,
    }
}

fn hit_content(value: Option<&Value>) -> Option<String> {
    let text = content_text(value);
    (!text.is_empty()).then_some(text)
}

fn file_search_hit_from(value: &Value) -> FileSearchHit {
    FileSearchHit {
        file_id: string_field(value, "file_id"),
        file_name: str_field(value, "file_name")
            .or_else(|| str_field(value, "filename"))
            .map(str::to_string),
        score: value.get("score").and_then(Value::as_f64),
        content: hit_content(value.get("content").or_else(|| value.get("text"))),
    }
}

/// Canonical file search records, Responses `file_search_call` items, or
/// Assistants run-step `file_search` tool calls.
pub(crate) fn file_search_result_from(value: &Value) -> FileSearchResult {
    let nested = value.get("file_search").unwrap_or(&Value::Null);
    let hits = [
        array_field(value, "hits"),
        array_field(value, "results"),
        array_field(nested, "results"),
    ]
    .into_iter()
    .find(|items| !items.is_empty())
    .unwrap_or(&[])
    .iter()
    .map(file_search_hit_from)
    .collect();

    let mut queries: Vec<String> = array_field(value, "queries")
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if let Some(query) = str_field(value, "query") {
        queries.push(query.to_string());
    }

    FileSearchResult {
        id: string_field(value, "id"),
        status: string_field(value, "status"),
        queries,
        hits,
    }
}

/// Canonical code execution records, Responses `code_interpreter_call`
/// items, or Assistants run-step `code_interpreter` tool calls.
pub(crate) fn code_interpreter_result_from(value: &Value) -> CodeInterpreterResult {
    let nested = value.get("code_interpreter").unwrap_or(value);
    let code = str_field(value, "code")
        .or_else(|| str_field(nested, "input"))
        .or_else(|| str_field(nested, "code"))
        .unwrap_or_default()
        .to_string();

    let outputs = first_array(nested, &["outputs", "results"]);
    let logs: Vec<&str> = outputs
        .iter()
        .filter(|o| str_field(o, "type") == Some("logs"))
        .filter_map(|o| str_field(o, "logs"))
        .collect();
    let output = str_field(value, "output")
        .map(str::to_string)
        .or_else(|| (!logs.is_empty()).then(|| logs.join("\n")));

    let mut files_created: Vec<String> = array_field(value, "files_created")
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    for output in outputs {
        match str_field(output, "type") {
            Some("image") => {
                let file = output
                    .get("image")
                    .and_then(|image| str_field(image, "file_id"))
                    .or_else(|| str_field(output, "file_id"))
                    .or_else(|| str_field(output, "url"));
                files_created.extend(file.map(str::to_string));
            }
            Some("files") => files_created.extend(
                array_field(output, "files")
                    .iter()
                    .filter_map(|f| str_field(f, "file_id").or_else(|| str_field(f, "filename")))
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    let error = match value.get("error").or_else(|| value.get("last_error")) {
        Some(Value::String(message)) => Some(message.clone()),
        Some(err @ Value::Object(_)) => str_field(err, "message")
            .map(str::to_string)
            .or_else(|| Some(err.to_string())),
        _ => None,
    };

    CodeInterpreterResult {
        id: string_field(value, "id"),
        status: string_field(value, "status"),
        language: str_field(value, "language")
            .map(str::to_string)
            .or_else(|| Some("python".to_string())),
        code,
        output,
        files_created,
        error,
    }
}

/// Reads the role, content, turn, usage, tool calls and any already
/// normalized tool-result arrays shared by every provider's message shape.
pub(crate) fn base_message(value: &Value) -> (ConversationMessage, Option<u32>) {
    let message = ConversationMessage::new(role_of(value), content_text(value.get("content")), 1)
        .with_usage(usage_of(value))
        .with_tool_calls(tool_calls_of(value))
        .with_web_search_results(
            array_field(value, "web_search_results")
                .iter()
                .map(web_search_result_from)
                .collect(),
        )
        .with_file_search_results(
            array_field(value, "file_search_results")
                .iter()
                .map(file_search_result_from)
                .collect(),
        )
        .with_code_interpreter_results(
            array_field(value, "code_interpreter_results")
                .iter()
                .map(code_interpreter_result_from)
                .collect(),
        );
    (message, explicit_turn(value))
}

/// Applies turn numbering and drops the explicit-turn bookkeeping.
pub(crate) fn finish_messages(
    mut messages: Vec<(ConversationMessage, Option<u32>)>,
) -> Vec<ConversationMessage> {
    assign_turns(&mut messages);
    messages.into_iter().map(|(message, _)| message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_text_variants() {
        assert_eq!(content_text(Some(&json!("plain"))), "plain");
        assert_eq!(
            content_text(Some(&json!([
                {"type": "text", "text": "a"},
                {"type": "image_url", "image_url": {"url": "x"}},
                {"type": "text", "text": {"value": "b", "annotations": []}}
            ]))),
            "a\nb"
        );
        assert_eq!(content_text(None), "");
        assert_eq!(content_text(Some(&json!(null))), "");
    }

    #[test]
    fn test_parse_arguments_falls_back_to_raw_string() {
        assert_eq!(parse_arguments(Some(&json!("{\"a\": 1}"))), json!({"a": 1}));
        assert_eq!(parse_arguments(Some(&json!("{broken"))), json!("{broken"));
        assert_eq!(parse_arguments(None), json!({}));
    }

    #[test]
    fn test_tool_call_shapes() {
        let chat = tool_call_from(&json!({
            "id": "call_1", "type": "function",
            "function": {"name": "get_weather", "arguments": "{\"city\": \"Paris\"}"}
        }));
        assert_eq!(chat.function_name.as_deref(), Some("get_weather"));
        assert_eq!(chat.arguments, json!({"city": "Paris"}));

        let responses = tool_call_from(&json!({
            "type": "function_call", "call_id": "call_2", "id": "fc_2",
            "name": "lookup", "arguments": "{}"
        }));
        assert_eq!(responses.id.as_deref(), Some("call_2"));
        assert_eq!(responses.call_type, "function");

        let anthropic = tool_call_from(&json!({
            "type": "tool_use", "id": "toolu_1", "name": "search", "input": {"q": "rust"}
        }));
        assert_eq!(anthropic.arguments, json!({"q": "rust"}));
    }

    #[test]
    fn test_usage_naming_variants() {
        let chat = usage_of(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}}));
        assert_eq!(chat.unwrap().total_tokens, Some(7));

        let responses = usage_of(&json!({"usage": {"input_tokens": 5, "output_tokens": 6}})).unwrap();
        assert_eq!(responses.prompt_tokens, Some(5));
        assert_eq!(responses.total_tokens, Some(11));

        assert!(usage_of(&json!({})).is_none());
        assert!(usage_of(&json!({"usage": {}})).is_none());
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = usage_of(&json!({"usage": {"input_tokens": u64::MAX, "output_tokens": 1}})).unwrap();
        assert_eq!(usage.prompt_tokens, Some(u64::MAX));
        assert_eq!(usage.total_tokens, Some(u64::MAX));
    }

    #[test]
    fn test_code_interpreter_outputs() {
        let result = code_interpreter_result_from(&json!({
            "id": "ci_1",
            "code_interpreter": {
                "input": "print(1)",
                "outputs": [
                    {"type": "logs", "logs": "1"},
                    {"type": "image", "image": {"file_id": "file-img"}}
                ]
            }
        }));
        assert_eq!(result.code, "print(1)");
        assert_eq!(result.output.as_deref(), Some("1"));
        assert_eq!(result.files_created, vec!["file-img".to_string()]);
        assert_eq!(result.language.as_deref(), Some("python"));
    }
}
