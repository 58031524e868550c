use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Api {
    ChatCompletions,
    Responses,
    Assistants,
    Messages,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::ChatCompletions => "chat_completions",
            Api::Responses => "responses",
            Api::Assistants => "assistants",
            Api::Messages => "messages",
        }
    }
}

/// Normalizes an identifier coming from callers that may use either the
/// string or the symbol spelling (`"OpenAI"`, `:openai`, `open-ai`).
fn canonical_ident(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(':')
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_ident(s).as_str() {
            "openai" | "open_ai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "google" | "gemini" => Ok(Provider::Google),
            other => Err(CoreError::NotFound(format!("unknown provider: {}", other))),
        }
    }
}

impl FromStr for Api {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_ident(s).as_str() {
            "chat_completions" | "chat_completion" | "chat" | "chat_completions_api" => {
                Ok(Api::ChatCompletions)
            }
            "responses" | "response" | "responses_api" | "response_api" => Ok(Api::Responses),
            "assistants" | "assistant" | "assistants_api" | "assistant_api" => Ok(Api::Assistants),
            "messages" | "message" | "messages_api" => Ok(Api::Messages),
            other => Err(CoreError::NotFound(format!("unknown api: {}", other))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (provider, api) pair: the shape a raw payload arrives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ApiTarget {
    pub provider: Provider,
    pub api: Api,
}

impl ApiTarget {
    pub const OPENAI_CHAT_COMPLETIONS: ApiTarget = ApiTarget::new(Provider::OpenAi, Api::ChatCompletions);
    pub const OPENAI_RESPONSES: ApiTarget = ApiTarget::new(Provider::OpenAi, Api::Responses);
    pub const OPENAI_ASSISTANTS: ApiTarget = ApiTarget::new(Provider::OpenAi, Api::Assistants);
    pub const ANTHROPIC_MESSAGES: ApiTarget = ApiTarget::new(Provider::Anthropic, Api::Messages);
    pub const GOOGLE_CHAT_COMPLETIONS: ApiTarget = ApiTarget::new(Provider::Google, Api::ChatCompletions);

    pub const fn new(provider: Provider, api: Api) -> Self {
        Self { provider, api }
    }

    /// Parse from loosely spelled identifiers; `None` when either side is unknown.
    pub fn parse(provider: &str, api: &str) -> Option<Self> {
        let provider = provider.parse().ok()?;
        let api = api.parse().ok()?;
        Some(Self::new(provider, api))
    }
}

impl fmt::Display for ApiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.api)
    }
}

/// The kind of entity that owns a test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestableKind {
    /// Rendered locally from a versioned prompt template.
    PromptVersion,
    /// Synced from a remote system (e.g. an OpenAI assistant).
    RemoteAssistant,
}

/// A testable entity reduced to what evaluator dispatch needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Testable {
    pub kind: TestableKind,
    pub api: ApiTarget,
}

impl Testable {
    pub fn prompt_version(api: ApiTarget) -> Self {
        Self {
            kind: TestableKind::PromptVersion,
            api,
        }
    }

    pub fn remote_assistant(provider: Provider) -> Self {
        Self {
            kind: TestableKind::RemoteAssistant,
            api: ApiTarget::new(provider, Api::Assistants),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing_accepts_symbol_spelling() {
        assert_eq!(":openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("open-ai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("mistral".parse::<Provider>().is_err());
    }

    #[test]
    fn test_api_aliases() {
        assert_eq!("chat_completion".parse::<Api>().unwrap(), Api::ChatCompletions);
        assert_eq!(":response_api".parse::<Api>().unwrap(), Api::Responses);
        assert_eq!("Assistants".parse::<Api>().unwrap(), Api::Assistants);
    }

    #[test]
    fn test_target_display_and_parse() {
        let target = ApiTarget::parse("openai", "assistants").unwrap();
        assert_eq!(target, ApiTarget::OPENAI_ASSISTANTS);
        assert_eq!(target.to_string(), "openai/assistants");
        assert!(ApiTarget::parse("openai", "batch").is_none());
    }

    #[test]
    fn test_provider_serde_names() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let api: Api = serde_json::from_str("\"chat_completions\"").unwrap();
        assert_eq!(api, Api::ChatCompletions);
    }
}
