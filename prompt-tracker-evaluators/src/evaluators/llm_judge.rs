use std::sync::Arc;

use async_trait::async_trait;
use prompt_tracker_core::{
    clamp_score, CoreError, EvaluationData, JudgeClient, NormalizedConversation, ParamSchema, ParamType,
    Result,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use crate::base::{resolve_config, Evaluator};
use crate::judging::{parse_judge_score, transcript};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct LlmJudgeSettings {
    pub judge_model: Option<String>,
    #[serde(default)]
    pub custom_instructions: String,
}

#[derive(Debug, Clone)]
struct Judgment {
    score: f64,
    feedback: Option<String>,
    raw: Value,
}

/// Asks a judge model for `{overall_score, feedback}` on the response.
pub struct LlmJudgeEvaluator {
    params: Map<String, Value>,
    judge: Arc<dyn JudgeClient>,
    judge_model: String,
    prompt: String,
    judgment: OnceCell<Judgment>,
}

impl LlmJudgeEvaluator {
    pub const KEY: &'static str = "llm_judge";

    const PARAM_SCHEMA: ParamSchema = &[
        ("judge_model", ParamType::String),
        ("custom_instructions", ParamType::String),
    ];

    pub fn default_config() -> Value {
        json!({"custom_instructions": "", "threshold_score": 70})
    }

    pub fn response_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "overall_score": {"type": "integer", "minimum": 0, "maximum": 100},
                "feedback": {"type": "string"}
            },
            "required": ["overall_score", "feedback"],
            "additionalProperties": false
        })
    }

    pub fn new(
        data: EvaluationData,
        config: &Map<String, Value>,
        context: &EvaluatorContext,
    ) -> Result<Self> {
        let (params, settings): (_, LlmJudgeSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let conversation = data.into_conversation();

        Ok(Self {
            params,
            judge: Arc::clone(&context.judge),
            judge_model: settings
                .judge_model
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| context.default_judge_model.clone()),
            prompt: build_prompt(&conversation, &settings.custom_instructions),
            judgment: OnceCell::new(),
        })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "LLM Judge",
            description: "Scores the response with a judge model",
            category: EvaluatorCategory::Judge,
            compatibility: ApiCompatibility::All,
            param_schema: Self::PARAM_SCHEMA,
            default_config: Self::default_config,
            build: Self::build,
        }
    }

    fn build(
        data: EvaluationData,
        config: &Map<String, Value>,
        context: &EvaluatorContext,
    ) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(Self::new(data, config, context)?))
    }

    pub fn judge_model(&self) -> &str {
        &self.judge_model
    }

    async fn judgment(&self) -> Result<&Judgment> {
        self.judgment
            .get_or_try_init(|| async {
                tracing::debug!("Requesting judgment from {}", self.judge_model);
                let raw = self
                    .judge
                    .call_with_schema(&self.judge_model, &self.prompt, &Self::response_schema())
                    .await?;
                Ok::<_, CoreError>(read_judgment(raw))
            })
            .await
    }
}

fn build_prompt(conversation: &NormalizedConversation, custom_instructions: &str) -> String {
    let mut prompt = String::from(
        "You are an expert evaluator of AI assistant responses. \
         Rate the response below from 0 to 100 for quality, accuracy and helpfulness.\n",
    );
    if !custom_instructions.trim().is_empty() {
        prompt.push_str("\nEvaluation instructions:\n");
        prompt.push_str(custom_instructions.trim());
        prompt.push('\n');
    }
    if conversation.messages.len() > 1 {
        prompt.push_str("\nConversation:\n");
        prompt.push_str(&transcript(&conversation.messages));
        prompt.push('\n');
    }
    prompt.push_str("\nResponse to evaluate:\n");
    prompt.push_str(conversation.response_text());
    prompt.push_str("\n\nRespond with an overall_score (integer 0-100) and feedback.");
    prompt
}

/// Reads `overall_score`, accepting numbers or numeric strings. Anything
/// else falls back to scanning the raw response text.
fn read_judgment(raw: Value) -> Judgment {
    let score = match raw.get("overall_score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .map(clamp_score)
    .unwrap_or_else(|| {
        tracing::warn!("Judge response has no usable overall_score");
        parse_judge_score(&raw.to_string())
    });
    let feedback = raw
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::to_string);
    Judgment { score, feedback, raw }
}

#[async_trait]
impl Evaluator for LlmJudgeEvaluator {
    fn evaluator_type(&self) -> &'static str {
        Self::KEY
    }

    fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    async fn evaluate_score(&self) -> Result<f64> {
        Ok(self.judgment().await?.score)
    }

    async fn generate_feedback(&self) -> Result<Option<String>> {
        Ok(self.judgment().await?.feedback.clone())
    }

    async fn metadata(&self) -> Result<Value> {
        let judgment = self.judgment().await?;
        Ok(json!({
            "judge_model": self.judge_model,
            "overall_score": judgment.score,
            "raw_response": judgment.raw,
            "threshold_score": self.params.get("threshold_score"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_judgment_clamps_and_falls_back() {
        assert_eq!(read_judgment(json!({"overall_score": 150, "feedback": "x"})).score, 100.0);
        assert_eq!(read_judgment(json!({"overall_score": "72"})).score, 72.0);
        assert_eq!(read_judgment(json!({"feedback": "nothing"})).score, 50.0);
    }

    #[test]
    fn test_prompt_contains_instructions_and_response() {
        let conversation = EvaluationData::from("The capital is Paris.").into_conversation();
        let prompt = build_prompt(&conversation, "Check geography facts.");
        assert!(prompt.contains("Check geography facts."));
        assert!(prompt.contains("The capital is Paris."));
        assert!(!prompt.contains("Conversation:"));
    }

    #[tokio::test]
    async fn test_mock_judge_default_threshold_is_70() {
        let context = EvaluatorContext::mock();
        let evaluator = LlmJudgeEvaluator::new("fine".into(), &Map::new(), &context).unwrap();

        let score = evaluator.evaluate_score().await.unwrap();
        assert!((60.0..=100.0).contains(&score));
        assert_eq!(evaluator.passed().await.unwrap(), score >= 70.0);
        assert_eq!(evaluator.judge_model(), "gpt-4o");
    }
}
