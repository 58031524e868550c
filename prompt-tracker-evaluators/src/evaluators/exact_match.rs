use async_trait::async_trait;
use prompt_tracker_core::{EvaluationData, ParamSchema, ParamType, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::Assessment;
use crate::base::{resolve_config, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct ExactMatchSettings {
    pub expected_output: String,
    pub case_sensitive: bool,
    pub trim_whitespace: bool,
    pub normalize_whitespace: bool,
}

impl ExactMatchSettings {
    fn normalize(&self, text: &str) -> String {
        let mut text = if self.normalize_whitespace {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else if self.trim_whitespace {
            text.trim().to_string()
        } else {
            text.to_string()
        };
        if !self.case_sensitive {
            text = text.to_lowercase();
        }
        text
    }
}

/// 100 when the response equals the expected output, 0 otherwise.
#[derive(Debug)]
pub struct ExactMatchEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
}

impl ExactMatchEvaluator {
    pub const KEY: &'static str = "exact_match";

    const PARAM_SCHEMA: ParamSchema = &[
        ("expected_output", ParamType::String),
        ("case_sensitive", ParamType::Boolean),
        ("trim_whitespace", ParamType::Boolean),
        ("normalize_whitespace", ParamType::Boolean),
    ];

    pub fn default_config() -> Value {
        json!({
            "expected_output": "",
            "case_sensitive": true,
            "trim_whitespace": true,
            "normalize_whitespace": false,
        })
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, ExactMatchSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let conversation = data.into_conversation();
        let actual = settings.normalize(conversation.response_text());
        let expected = settings.normalize(&settings.expected_output);
        let matched = actual == expected;

        let feedback = if matched {
            "✓ Response matches the expected output".to_string()
        } else {
            format!(
                "✗ Response does not match the expected output ({} vs {} characters)",
                actual.chars().count(),
                expected.chars().count()
            )
        };
        let assessment = Assessment::new(
            if matched { 100.0 } else { 0.0 },
            feedback,
            json!({
                "matched": matched,
                "expected": settings.expected_output,
                "case_sensitive": settings.case_sensitive,
                "normalize_whitespace": settings.normalize_whitespace,
            }),
        );
        Ok(Self { params, assessment })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Exact Match",
            description: "Compares the response to an expected output",
            category: EvaluatorCategory::Content,
            compatibility: ApiCompatibility::All,
            param_schema: Self::PARAM_SCHEMA,
            default_config: Self::default_config,
            build: Self::build,
        }
    }

    fn build(
        data: EvaluationData,
        config: &Map<String, Value>,
        _context: &EvaluatorContext,
    ) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(Self::new(data, config)?))
    }
}

#[async_trait]
impl Evaluator for ExactMatchEvaluator {
    fn evaluator_type(&self) -> &'static str {
        Self::KEY
    }

    fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    async fn evaluate_score(&self) -> Result<f64> {
        Ok(self.assessment.score)
    }

    async fn generate_feedback(&self) -> Result<Option<String>> {
        Ok(self.assessment.feedback.clone())
    }

    async fn metadata(&self) -> Result<Value> {
        Ok(self.assessment.metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn score(text: &str, config: Value) -> f64 {
        ExactMatchEvaluator::new(text.into(), config.as_object().unwrap())
            .unwrap()
            .assessment
            .score
    }

    #[test_case("Paris", json!({"expected_output": "Paris"}), 100.0 ; "identical")]
    #[test_case("  Paris\n", json!({"expected_output": "Paris"}), 100.0 ; "trimmed")]
    #[test_case("paris", json!({"expected_output": "Paris"}), 0.0 ; "case sensitive by default")]
    #[test_case("paris", json!({"expected_output": "Paris", "case_sensitive": false}), 100.0 ; "case insensitive")]
    #[test_case(" Paris ", json!({"expected_output": "Paris", "trim_whitespace": false}), 0.0 ; "untrimmed")]
    #[test_case("New   York\ncity", json!({"expected_output": "New York city", "normalize_whitespace": true}), 100.0 ; "collapsed whitespace")]
    fn test_exact_match(text: &str, config: Value, expected: f64) {
        assert_eq!(score(text, config), expected);
    }
}
