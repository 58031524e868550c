use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::conversation::{
    CodeInterpreterResult, ConversationMessage, FileSearchResult, Role, ToolCall, WebSearchResult,
};

/// One LLM turn with no conversation context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub web_search_results: Vec<WebSearchResult>,
    #[serde(default)]
    pub file_search_results: Vec<FileSearchResult>,
    #[serde(default)]
    pub code_interpreter_results: Vec<CodeInterpreterResult>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NormalizedResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A tool call tagged with where it happened in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub turn: u32,
    pub message_index: usize,
    pub call: ToolCall,
}

/// An Assistants API run step with its nested tool output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStep {
    pub id: Option<String>,
    pub step_type: String,
    pub status: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub file_search_results: Vec<FileSearchResult>,
    #[serde(default)]
    pub code_interpreter_results: Vec<CodeInterpreterResult>,
}

/// The canonical shape every evaluator works on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedConversation {
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub tool_usage: Vec<ToolInvocation>,
    #[serde(default)]
    pub web_search_results: Vec<WebSearchResult>,
    #[serde(default)]
    pub code_interpreter_results: Vec<CodeInterpreterResult>,
    #[serde(default)]
    pub file_search_results: Vec<FileSearchResult>,
    #[serde(default)]
    pub run_steps: Option<Vec<RunStep>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NormalizedConversation {
    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        let mut conversation = Self {
            messages,
            ..Default::default()
        };
        conversation.tool_usage = conversation.collect_tool_usage();
        conversation
    }

    /// Builds `tool_usage` from the tool calls carried by each message.
    pub fn collect_tool_usage(&self) -> Vec<ToolInvocation> {
        self.messages
            .iter()
            .enumerate()
            .flat_map(|(index, message)| {
                message.tool_calls.iter().map(move |call| ToolInvocation {
                    turn: message.turn,
                    message_index: index,
                    call: call.clone(),
                })
            })
            .collect()
    }

    /// Fills `file_search_results` from the run steps when the top-level
    /// field is empty. Top-level results, when present, are authoritative.
    pub fn with_flattened_run_steps(mut self) -> Self {
        if self.file_search_results.is_empty() {
            if let Some(steps) = &self.run_steps {
                self.file_search_results = steps
                    .iter()
                    .flat_map(|step| step.file_search_results.iter().cloned())
                    .collect();
            }
        }
        if self.code_interpreter_results.is_empty() {
            if let Some(steps) = &self.run_steps {
                self.code_interpreter_results = steps
                    .iter()
                    .flat_map(|step| step.code_interpreter_results.iter().cloned())
                    .collect();
            }
        }
        self
    }

    pub fn assistant_messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter().filter(|m| m.role == Role::Assistant)
    }

    /// Content of the final assistant message; empty when there is none.
    pub fn response_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    pub fn all_web_search_results(&self) -> Vec<&WebSearchResult> {
        merge_unique(
            &self.web_search_results,
            self.messages.iter().flat_map(|m| m.web_search_results.iter()),
            |r| r.id.as_deref(),
        )
    }

    pub fn all_file_search_results(&self) -> Vec<&FileSearchResult> {
        merge_unique(
            &self.file_search_results,
            self.messages.iter().flat_map(|m| m.file_search_results.iter()),
            |r| r.id.as_deref(),
        )
    }

    pub fn all_code_interpreter_results(&self) -> Vec<&CodeInterpreterResult> {
        merge_unique(
            &self.code_interpreter_results,
            self.messages
                .iter()
                .flat_map(|m| m.code_interpreter_results.iter()),
            |r| r.id.as_deref(),
        )
    }
}

/// Top-level entries first, then per-message entries whose id has not been
/// seen yet. Entries without an id are always kept.
fn merge_unique<'a, T, I, F>(top_level: &'a [T], per_message: I, id: F) -> Vec<&'a T>
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> Option<&str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for item in top_level.iter().chain(per_message) {
        match id(item) {
            Some(key) if !seen.insert(key.to_string()) => continue,
            _ => merged.push(item),
        }
    }
    merged
}

/// Evaluator input: whatever the caller had at hand.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationData {
    Text(String),
    Response(NormalizedResponse),
    Conversation(NormalizedConversation),
}

impl EvaluationData {
    /// Detects the shape of an already-normalized JSON value. Unknown shapes
    /// degrade to empty text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => EvaluationData::Text(text),
            Value::Object(ref map) if map.get("messages").is_some_and(Value::is_array) => {
                match serde_json::from_value::<NormalizedConversation>(value.clone()) {
                    Ok(conversation) => {
                        EvaluationData::Conversation(conversation.with_flattened_run_steps())
                    }
                    Err(err) => {
                        tracing::warn!("Could not read conversation data: {}", err);
                        EvaluationData::Text(String::new())
                    }
                }
            }
            Value::Object(ref map) if map.contains_key("text") || map.contains_key("response_text") => {
                let mut response: NormalizedResponse =
                    serde_json::from_value(value.clone()).unwrap_or_default();
                if response.text.is_empty() {
                    if let Some(text) = map
                        .get("text")
                        .or_else(|| map.get("response_text"))
                        .and_then(Value::as_str)
                    {
                        response.text = text.to_string();
                    }
                }
                EvaluationData::Response(response)
            }
            Value::Null => EvaluationData::Text(String::new()),
            _ => {
                tracing::warn!("Unrecognized evaluation data shape, treating as empty text");
                EvaluationData::Text(String::new())
            }
        }
    }

    /// Coerces any input into the conversation shape. Text and single
    /// responses become one synthetic assistant message at turn 1.
    pub fn into_conversation(self) -> NormalizedConversation {
        match self {
            EvaluationData::Conversation(conversation) => conversation.with_flattened_run_steps(),
            EvaluationData::Text(text) => {
                NormalizedConversation::from_messages(vec![ConversationMessage::new(
                    Role::Assistant,
                    text,
                    1,
                )])
            }
            EvaluationData::Response(response) => {
                let message = ConversationMessage::new(Role::Assistant, response.text, 1)
                    .with_tool_calls(response.tool_calls)
                    .with_web_search_results(response.web_search_results)
                    .with_file_search_results(response.file_search_results)
                    .with_code_interpreter_results(response.code_interpreter_results);
                let mut conversation = NormalizedConversation::from_messages(vec![message]);
                conversation.metadata = response.metadata;
                conversation
            }
        }
    }
}

impl From<&str> for EvaluationData {
    fn from(text: &str) -> Self {
        EvaluationData::Text(text.to_string())
    }
}

impl From<String> for EvaluationData {
    fn from(text: String) -> Self {
        EvaluationData::Text(text)
    }
}

impl From<NormalizedResponse> for EvaluationData {
    fn from(response: NormalizedResponse) -> Self {
        EvaluationData::Response(response)
    }
}

impl From<NormalizedConversation> for EvaluationData {
    fn from(conversation: NormalizedConversation) -> Self {
        EvaluationData::Conversation(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_bare_string_coerces_to_single_assistant_message() {
        let conversation = EvaluationData::from("hello").into_conversation();

        assert_eq!(conversation.messages.len(), 1);
        let message = &conversation.messages[0];
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "hello");
        assert_eq!(message.turn, 1);
    }

    #[test]
    fn test_response_coercion_keeps_tool_calls() {
        let response = NormalizedResponse {
            text: "done".to_string(),
            tool_calls: vec![ToolCall::function(
                Some("call_1".to_string()),
                "lookup",
                json!({"id": 3}),
            )],
            ..Default::default()
        };

        let conversation = EvaluationData::from(response).into_conversation();
        assert_eq!(conversation.response_text(), "done");
        assert_eq!(conversation.tool_usage.len(), 1);
        assert_eq!(conversation.tool_usage[0].turn, 1);
    }

    #[test]
    fn test_from_value_detects_shapes() {
        assert!(matches!(EvaluationData::from_value(json!("hi")), EvaluationData::Text(_)));
        assert!(matches!(
            EvaluationData::from_value(json!({"text": "hi"})),
            EvaluationData::Response(_)
        ));
        assert!(matches!(
            EvaluationData::from_value(json!({"messages": []})),
            EvaluationData::Conversation(_)
        ));
        assert_eq!(
            EvaluationData::from_value(json!(42)),
            EvaluationData::Text(String::new())
        );
    }

    #[test]
    fn test_run_step_flattening_when_top_level_missing() {
        let conversation = NormalizedConversation {
            messages: vec![ConversationMessage::new(Role::Assistant, "see file", 1)],
            run_steps: Some(vec![RunStep {
                step_type: "tool_calls".to_string(),
                file_search_results: vec![FileSearchResult {
                    id: Some("fs_1".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }]),
            ..Default::default()
        }
        .with_flattened_run_steps();

        assert_eq!(conversation.file_search_results.len(), 1);
        assert_eq!(conversation.all_file_search_results().len(), 1);
    }

    #[test]
    fn test_response_text_is_last_assistant_message() {
        let conversation = NormalizedConversation::from_messages(vec![
            ConversationMessage::new(Role::User, "q1", 1),
            ConversationMessage::new(Role::Assistant, "a1", 1),
            ConversationMessage::new(Role::User, "q2", 2),
            ConversationMessage::new(Role::Assistant, "a2", 2),
        ]);
        assert_eq!(conversation.response_text(), "a2");
        assert_eq!(conversation.assistant_messages().count(), 2);
    }

    #[test]
    fn test_merge_unique_skips_duplicate_ids() {
        let result = WebSearchResult {
            id: Some("ws_1".to_string()),
            ..Default::default()
        };
        let mut conversation = NormalizedConversation::from_messages(vec![
            ConversationMessage::new(Role::Assistant, "a", 1)
                .with_web_search_results(vec![result.clone()]),
        ]);
        conversation.web_search_results = vec![result];

        assert_eq!(conversation.all_web_search_results().len(), 1);
    }
}
