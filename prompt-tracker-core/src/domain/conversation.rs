use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Lenient parse used at the normalizer boundary. Unknown roles are
    /// treated as assistant output so a message never lacks a role.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Role::User,
            "system" | "developer" => Role::System,
            "tool" | "function" => Role::Tool,
            _ => Role::Assistant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: Option<String>,
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    pub function_name: Option<String>,
    /// Parsed JSON arguments, or the raw string when the provider sent
    /// something that does not parse.
    #[serde(default)]
    pub arguments: Value,
}

fn function_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn function(id: Option<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id,
            call_type: "function".to_string(),
            function_name: Some(name.into()),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebSource {
    pub url: String,
    pub title: Option<String>,
}

impl WebSource {
    /// Host part of the URL without scheme, port or a leading `www.`.
    pub fn domain(&self) -> String {
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let host = host.rsplit('@').next().unwrap_or(host);
        let host = host.split(':').next().unwrap_or(host);
        host.trim_start_matches("www.").to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebSearchResult {
    pub id: Option<String>,
    pub status: Option<String>,
    pub query: Option<String>,
    pub sources: Vec<WebSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileSearchHit {
    pub file_id: Option<String>,
    pub file_name: Option<String>,
    pub score: Option<f64>,
    pub content: Option<String>,
}

impl FileSearchHit {
    /// Name used for matching: the file name, or the id when the provider
    /// omitted the name.
    pub fn display_name(&self) -> Option<&str> {
        self.file_name.as_deref().or(self.file_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileSearchResult {
    pub id: Option<String>,
    pub status: Option<String>,
    pub queries: Vec<String>,
    pub hits: Vec<FileSearchHit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodeInterpreterResult {
    pub id: Option<String>,
    pub status: Option<String>,
    pub language: Option<String>,
    pub code: String,
    pub output: Option<String>,
    pub files_created: Vec<String>,
    pub error: Option<String>,
}

impl CodeInterpreterResult {
    pub fn succeeded(&self) -> bool {
        if self.error.is_some() {
            return false;
        }
        !matches!(
            self.status.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("failed" | "error" | "incomplete" | "cancelled" | "expired")
        )
    }

    pub fn code_line_count(&self) -> usize {
        self.code.lines().filter(|line| !line.trim().is_empty()).count()
    }
}

fn first_turn() -> u32 {
    1
}

/// One turn of a conversation as seen by evaluators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default = "first_turn")]
    pub turn: u32,
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub file_search_results: Vec<FileSearchResult>,
    #[serde(default)]
    pub web_search_results: Vec<WebSearchResult>,
    #[serde(default)]
    pub code_interpreter_results: Vec<CodeInterpreterResult>,
    #[serde(default)]
    pub api_metadata: Map<String, Value>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>, turn: u32) -> Self {
        Self {
            role,
            content: content.into(),
            turn: turn.max(1),
            usage: None,
            tool_calls: Vec::new(),
            file_search_results: Vec::new(),
            web_search_results: Vec::new(),
            code_interpreter_results: Vec::new(),
            api_metadata: Map::new(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage.filter(|u| !u.is_empty());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_web_search_results(mut self, results: Vec<WebSearchResult>) -> Self {
        self.web_search_results = results;
        self
    }

    pub fn with_file_search_results(mut self, results: Vec<FileSearchResult>) -> Self {
        self.file_search_results = results;
        self
    }

    pub fn with_code_interpreter_results(mut self, results: Vec<CodeInterpreterResult>) -> Self {
        self.code_interpreter_results = results;
        self
    }

    pub fn with_api_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.api_metadata = metadata;
        self
    }
}

/// Assigns turn numbers in place: a turn is a user message plus everything
/// that follows it until the next user message. Explicit turns win.
pub fn assign_turns(messages: &mut [(ConversationMessage, Option<u32>)]) {
    let mut user_count = 0u32;
    for (message, explicit) in messages.iter_mut() {
        if message.role == Role::User {
            user_count += 1;
        }
        message.turn = explicit.unwrap_or(user_count).max(1);
    }
}
