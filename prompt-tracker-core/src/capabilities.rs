//! Static (provider, api) capability matrix.
//!
//! Lookups never fail: unknown pairs have no built-in tools and no features,
//! and get the full default playground panel set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{Api, ApiTarget, Provider};
use crate::error::CoreError;

/// A tool the provider executes itself, as opposed to a user function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    WebSearch,
    FileSearch,
    CodeInterpreter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    FunctionCalling,
    StructuredOutput,
    Streaming,
    Vision,
    ConversationState,
    Threads,
    RunSteps,
    /// The testable is synced from a remote system rather than rendered
    /// from a local template.
    RemoteEntityLinked,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiPanel {
    SystemPrompt,
    UserPrompt,
    Variables,
    ModelConfig,
    Tools,
    ResponseFormat,
    FileAttachments,
    ConversationHistory,
    RemoteEntitySync,
}

macro_rules! str_enum {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().trim_start_matches(':').to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(CoreError::NotFound(format!(
                        "unknown {}: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(BuiltinTool {
    WebSearch => "web_search",
    FileSearch => "file_search",
    CodeInterpreter => "code_interpreter",
});

str_enum!(Feature {
    FunctionCalling => "function_calling",
    StructuredOutput => "structured_output",
    Streaming => "streaming",
    Vision => "vision",
    ConversationState => "conversation_state",
    Threads => "threads",
    RunSteps => "run_steps",
    RemoteEntityLinked => "remote_entity_linked",
});

str_enum!(UiPanel {
    SystemPrompt => "system_prompt",
    UserPrompt => "user_prompt",
    Variables => "variables",
    ModelConfig => "model_config",
    Tools => "tools",
    ResponseFormat => "response_format",
    FileAttachments => "file_attachments",
    ConversationHistory => "conversation_history",
    RemoteEntitySync => "remote_entity_sync",
});

/// Panels shown when the (provider, api) pair is not in the matrix: every
/// panel.
pub const DEFAULT_PLAYGROUND_PANELS: &[UiPanel] = &[
    UiPanel::SystemPrompt,
    UiPanel::UserPrompt,
    UiPanel::Variables,
    UiPanel::ModelConfig,
    UiPanel::Tools,
    UiPanel::ResponseFormat,
    UiPanel::FileAttachments,
    UiPanel::ConversationHistory,
    UiPanel::RemoteEntitySync,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityEntry {
    pub target: ApiTarget,
    pub builtin_tools: &'static [BuiltinTool],
    pub features: &'static [Feature],
    pub playground_ui_panels: &'static [UiPanel],
}

const MATRIX: &[CapabilityEntry] = &[
    CapabilityEntry {
        target: ApiTarget::OPENAI_CHAT_COMPLETIONS,
        builtin_tools: &[],
        features: &[
            Feature::FunctionCalling,
            Feature::StructuredOutput,
            Feature::Streaming,
            Feature::Vision,
        ],
        playground_ui_panels: &[
            UiPanel::SystemPrompt,
            UiPanel::UserPrompt,
            UiPanel::Variables,
            UiPanel::ModelConfig,
            UiPanel::Tools,
            UiPanel::ResponseFormat,
        ],
    },
    CapabilityEntry {
        target: ApiTarget::OPENAI_RESPONSES,
        builtin_tools: &[
            BuiltinTool::WebSearch,
            BuiltinTool::FileSearch,
            BuiltinTool::CodeInterpreter,
        ],
        features: &[
            Feature::FunctionCalling,
            Feature::StructuredOutput,
            Feature::Streaming,
            Feature::Vision,
            Feature::ConversationState,
        ],
        playground_ui_panels: &[
            UiPanel::SystemPrompt,
            UiPanel::UserPrompt,
            UiPanel::Variables,
            UiPanel::ModelConfig,
            UiPanel::Tools,
            UiPanel::ResponseFormat,
            UiPanel::FileAttachments,
            UiPanel::ConversationHistory,
        ],
    },
    CapabilityEntry {
        target: ApiTarget::OPENAI_ASSISTANTS,
        builtin_tools: &[BuiltinTool::FileSearch, BuiltinTool::CodeInterpreter],
        features: &[
            Feature::FunctionCalling,
            Feature::Threads,
            Feature::RunSteps,
            Feature::RemoteEntityLinked,
        ],
        playground_ui_panels: &[
            UiPanel::ModelConfig,
            UiPanel::Tools,
            UiPanel::FileAttachments,
            UiPanel::ConversationHistory,
            UiPanel::RemoteEntitySync,
        ],
    },
    CapabilityEntry {
        target: ApiTarget::ANTHROPIC_MESSAGES,
        builtin_tools: &[BuiltinTool::WebSearch],
        features: &[Feature::FunctionCalling, Feature::Streaming, Feature::Vision],
        playground_ui_panels: &[
            UiPanel::SystemPrompt,
            UiPanel::UserPrompt,
            UiPanel::Variables,
            UiPanel::ModelConfig,
            UiPanel::Tools,
        ],
    },
    CapabilityEntry {
        target: ApiTarget::GOOGLE_CHAT_COMPLETIONS,
        builtin_tools: &[],
        features: &[
            Feature::FunctionCalling,
            Feature::StructuredOutput,
            Feature::Streaming,
        ],
        playground_ui_panels: &[
            UiPanel::SystemPrompt,
            UiPanel::UserPrompt,
            UiPanel::Variables,
            UiPanel::ModelConfig,
            UiPanel::Tools,
            UiPanel::ResponseFormat,
        ],
    },
];

pub struct ApiCapabilities;

impl ApiCapabilities {
    pub fn entries() -> &'static [CapabilityEntry] {
        MATRIX
    }

    pub fn entry(provider: Provider, api: Api) -> Option<&'static CapabilityEntry> {
        let target = ApiTarget::new(provider, api);
        MATRIX.iter().find(|entry| entry.target == target)
    }

    pub fn builtin_tools_for(provider: Provider, api: Api) -> &'static [BuiltinTool] {
        Self::entry(provider, api)
            .map(|entry| entry.builtin_tools)
            .unwrap_or(&[])
    }

    pub fn supports_feature(provider: Provider, api: Api, feature: Feature) -> bool {
        Self::entry(provider, api).is_some_and(|entry| entry.features.contains(&feature))
    }

    pub fn supports_builtin_tool(provider: Provider, api: Api, tool: BuiltinTool) -> bool {
        Self::builtin_tools_for(provider, api).contains(&tool)
    }

    pub fn playground_ui_for(provider: Provider, api: Api) -> &'static [UiPanel] {
        Self::entry(provider, api)
            .map(|entry| entry.playground_ui_panels)
            .unwrap_or(DEFAULT_PLAYGROUND_PANELS)
    }

    pub fn remote_entity_linked(provider: Provider, api: Api) -> bool {
        Self::supports_feature(provider, api, Feature::RemoteEntityLinked)
    }

    /// Every known target whose API executes `tool` itself.
    pub fn apis_with_builtin_tool(tool: BuiltinTool) -> Vec<ApiTarget> {
        MATRIX
            .iter()
            .filter(|entry| entry.builtin_tools.contains(&tool))
            .map(|entry| entry.target)
            .collect()
    }

    // String entry points. Callers may pass either the string or the symbol
    // spelling of an identifier; unknown identifiers never error.

    pub fn builtin_tools_for_str(provider: &str, api: &str) -> &'static [BuiltinTool] {
        ApiTarget::parse(provider, api)
            .map(|t| Self::builtin_tools_for(t.provider, t.api))
            .unwrap_or(&[])
    }

    pub fn supports_feature_str(provider: &str, api: &str, feature: &str) -> bool {
        let (Some(target), Ok(feature)) = (ApiTarget::parse(provider, api), feature.parse::<Feature>()) else {
            return false;
        };
        Self::supports_feature(target.provider, target.api, feature)
    }

    pub fn playground_ui_for_str(provider: &str, api: &str) -> &'static [UiPanel] {
        ApiTarget::parse(provider, api)
            .map(|t| Self::playground_ui_for(t.provider, t.api))
            .unwrap_or(DEFAULT_PLAYGROUND_PANELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tools() {
        assert_eq!(
            ApiCapabilities::builtin_tools_for(Provider::OpenAi, Api::Assistants),
            &[BuiltinTool::FileSearch, BuiltinTool::CodeInterpreter]
        );
        assert!(ApiCapabilities::builtin_tools_for(Provider::OpenAi, Api::ChatCompletions).is_empty());
        assert!(ApiCapabilities::builtin_tools_for(Provider::Google, Api::Assistants).is_empty());
    }

    #[test]
    fn test_string_and_symbol_spellings_are_interchangeable() {
        assert_eq!(
            ApiCapabilities::builtin_tools_for_str("openai", "responses"),
            ApiCapabilities::builtin_tools_for_str(":openai", ":responses")
        );
        assert!(ApiCapabilities::supports_feature_str(":openai", "assistants", ":remote_entity_linked"));
        assert!(ApiCapabilities::supports_feature_str("OpenAI", "Assistants", "threads"));
    }

    #[test]
    fn test_unknown_inputs_never_fail() {
        assert!(ApiCapabilities::builtin_tools_for_str("mistral", "chat").is_empty());
        assert!(!ApiCapabilities::supports_feature_str("openai", "batch", "streaming"));
        assert!(!ApiCapabilities::supports_feature_str("openai", "responses", "teleport"));
        assert_eq!(
            ApiCapabilities::playground_ui_for_str("mistral", "chat"),
            DEFAULT_PLAYGROUND_PANELS
        );
    }

    #[test]
    fn test_unmatrixed_known_pair_falls_back_to_default_panels() {
        assert_eq!(
            ApiCapabilities::playground_ui_for(Provider::Anthropic, Api::Assistants),
            DEFAULT_PLAYGROUND_PANELS
        );
    }

    #[test]
    fn test_default_panels_cover_every_matrix_panel() {
        for entry in MATRIX {
            for panel in entry.playground_ui_panels {
                assert!(DEFAULT_PLAYGROUND_PANELS.contains(panel), "{:?} missing", panel);
            }
        }
        assert!(DEFAULT_PLAYGROUND_PANELS.contains(&UiPanel::RemoteEntitySync));
    }

    #[test]
    fn test_remote_entity_linked_hides_template_panels() {
        assert!(ApiCapabilities::remote_entity_linked(Provider::OpenAi, Api::Assistants));
        let panels = ApiCapabilities::playground_ui_for(Provider::OpenAi, Api::Assistants);
        assert!(!panels.contains(&UiPanel::SystemPrompt));
        assert!(!panels.contains(&UiPanel::Variables));
        assert!(panels.contains(&UiPanel::RemoteEntitySync));
    }

    #[test]
    fn test_apis_with_builtin_tool() {
        let web = ApiCapabilities::apis_with_builtin_tool(BuiltinTool::WebSearch);
        assert_eq!(web, vec![ApiTarget::OPENAI_RESPONSES, ApiTarget::ANTHROPIC_MESSAGES]);
    }
}
