//! Evaluator catalogue and API compatibility dispatch.

use std::fmt;
use std::sync::Arc;

use prompt_tracker_core::{
    ApiTarget, CoreError, EvaluationData, EvaluatorConfig, JudgeClient, JudgeMode,
    MockJudgeClient, ParamSchema, Result, Testable, TrackerConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::base::Evaluator;
use crate::evaluators::{
    CodeInterpreterEvaluator, ConversationJudgeEvaluator, ExactMatchEvaluator, FileSearchEvaluator,
    FormatEvaluator, KeywordEvaluator, LengthEvaluator, LlmJudgeEvaluator, PatternMatchEvaluator,
    WebSearchEvaluator,
};

/// Shared collaborators handed to every evaluator builder.
#[derive(Clone)]
pub struct EvaluatorContext {
    pub judge: Arc<dyn JudgeClient>,
    pub default_judge_model: String,
}

impl EvaluatorContext {
    pub fn new(judge: Arc<dyn JudgeClient>, default_judge_model: impl Into<String>) -> Self {
        Self {
            judge,
            default_judge_model: default_judge_model.into(),
        }
    }

    /// Deterministic offline judging.
    pub fn mock() -> Self {
        Self::new(
            Arc::new(MockJudgeClient::new()),
            prompt_tracker_core::DEFAULT_JUDGE_MODEL,
        )
    }

    /// Picks the judge from the configured mode. Real mode needs a client
    /// from the caller; the core ships no HTTP transport.
    pub fn from_config(config: &TrackerConfig, real_judge: Option<Arc<dyn JudgeClient>>) -> Result<Self> {
        let judge: Arc<dyn JudgeClient> = match (config.judge_mode(), real_judge) {
            (JudgeMode::Mock, _) => Arc::new(MockJudgeClient::new()),
            (JudgeMode::Real, Some(judge)) => judge,
            (JudgeMode::Real, None) => {
                return Err(CoreError::Config(
                    "use_real_llm is enabled but no judge client was provided".to_string(),
                ))
            }
        };
        Ok(Self::new(judge, config.default_judge_model.clone()))
    }
}

impl fmt::Debug for EvaluatorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorContext")
            .field("default_judge_model", &self.default_judge_model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorCategory {
    Content,
    Format,
    Judge,
    ToolUsage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCompatibility {
    All,
    Only(Vec<ApiTarget>),
}

impl ApiCompatibility {
    pub fn supports(&self, target: ApiTarget) -> bool {
        match self {
            ApiCompatibility::All => true,
            ApiCompatibility::Only(targets) => targets.contains(&target),
        }
    }
}

pub type BuildFn =
    fn(EvaluationData, &Map<String, Value>, &EvaluatorContext) -> Result<Box<dyn Evaluator>>;

#[derive(Clone)]
pub struct EvaluatorDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: EvaluatorCategory,
    pub compatibility: ApiCompatibility,
    pub param_schema: ParamSchema,
    pub default_config: fn() -> Value,
    pub build: BuildFn,
}

impl fmt::Debug for EvaluatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorDescriptor")
            .field("key", &self.key)
            .field("category", &self.category)
            .field("compatibility", &self.compatibility)
            .finish_non_exhaustive()
    }
}

impl EvaluatorDescriptor {
    pub fn compatible_with_apis(&self) -> &ApiCompatibility {
        &self.compatibility
    }

    pub fn compatible_with(&self, testable: &Testable) -> bool {
        self.compatibility.supports(testable.api)
    }
}

/// The catalogue of evaluators a caller may configure.
#[derive(Debug, Clone)]
pub struct EvaluatorRegistry {
    descriptors: Vec<EvaluatorDescriptor>,
}

impl EvaluatorRegistry {
    pub fn new(descriptors: Vec<EvaluatorDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            LengthEvaluator::descriptor(),
            KeywordEvaluator::descriptor(),
            FormatEvaluator::descriptor(),
            ExactMatchEvaluator::descriptor(),
            PatternMatchEvaluator::descriptor(),
            LlmJudgeEvaluator::descriptor(),
            ConversationJudgeEvaluator::descriptor(),
            WebSearchEvaluator::descriptor(),
            CodeInterpreterEvaluator::descriptor(),
            FileSearchEvaluator::descriptor(),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&EvaluatorDescriptor> {
        self.descriptors.iter().find(|d| d.key == key)
    }

    pub fn all(&self) -> &[EvaluatorDescriptor] {
        &self.descriptors
    }

    pub fn for_api(&self, target: ApiTarget) -> Vec<&EvaluatorDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.compatibility.supports(target))
            .collect()
    }

    pub fn for_testable(&self, testable: &Testable) -> Vec<&EvaluatorDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.compatible_with(testable))
            .collect()
    }

    /// Builds the evaluator a config record names, passing the record-level
    /// threshold through as `threshold_score`.
    pub fn build(
        &self,
        config: &EvaluatorConfig,
        data: EvaluationData,
        context: &EvaluatorContext,
    ) -> Result<Box<dyn Evaluator>> {
        config.validate()?;
        if !config.enabled {
            return Err(CoreError::InvalidState(format!(
                "evaluator {} is disabled",
                config.evaluator_key
            )));
        }
        let descriptor = self.get(&config.evaluator_key).ok_or_else(|| {
            CoreError::NotFound(format!("unknown evaluator: {}", config.evaluator_key))
        })?;

        tracing::debug!("Building evaluator {}", descriptor.key);
        (descriptor.build)(data, &config.effective_config(), context)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prompt_tracker_core::Provider;
    use serde_json::json;

    #[test]
    fn test_builtin_keys_are_unique() {
        let registry = EvaluatorRegistry::builtin();
        let mut keys: Vec<&str> = registry.all().iter().map(|d| d.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), registry.all().len());
    }

    #[test]
    fn test_chat_completions_excludes_tool_evaluators() {
        let registry = EvaluatorRegistry::builtin();
        let keys: Vec<&str> = registry
            .for_api(ApiTarget::OPENAI_CHAT_COMPLETIONS)
            .iter()
            .map(|d| d.key)
            .collect();
        assert!(keys.contains(&"keyword"));
        assert!(!keys.contains(&"web_search"));
        assert!(!keys.contains(&"file_search"));
        assert!(!keys.contains(&"code_interpreter"));
    }

    #[test]
    fn test_remote_assistant_gets_file_search() {
        let registry = EvaluatorRegistry::builtin();
        let testable = Testable::remote_assistant(Provider::OpenAi);
        let keys: Vec<&str> = registry.for_testable(&testable).iter().map(|d| d.key).collect();
        assert!(keys.contains(&"file_search"));
        assert!(keys.contains(&"code_interpreter"));
        assert!(!keys.contains(&"web_search"));
    }

    #[test]
    fn test_build_errors() {
        let registry = EvaluatorRegistry::builtin();
        let context = EvaluatorContext::mock();

        let unknown = registry.build(&EvaluatorConfig::new("nope", json!({})), "x".into(), &context);
        assert!(matches!(unknown, Err(CoreError::NotFound(_))));

        let disabled = registry.build(
            &EvaluatorConfig::new("length", json!({})).disabled(),
            "x".into(),
            &context,
        );
        assert!(matches!(disabled, Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn test_from_config_requires_client_in_real_mode() {
        let config = TrackerConfig {
            use_real_llm: true,
            ..Default::default()
        };
        assert!(matches!(
            EvaluatorContext::from_config(&config, None),
            Err(CoreError::Config(_))
        ));
        assert!(EvaluatorContext::from_config(&TrackerConfig::default(), None).is_ok());
    }
}
