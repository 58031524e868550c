use async_trait::async_trait;
use prompt_tracker_core::{EvaluationData, ParamSchema, ParamType, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{mark, Assessment};
use crate::base::{contains, resolve_config, weighted, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordSettings {
    pub required_keywords: Vec<String>,
    pub forbidden_keywords: Vec<String>,
    pub case_sensitive: bool,
}

/// Required keywords present, forbidden keywords absent.
#[derive(Debug)]
pub struct KeywordEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
}

impl KeywordEvaluator {
    pub const KEY: &'static str = "keyword";

    const PARAM_SCHEMA: ParamSchema = &[
        ("required_keywords", ParamType::Array),
        ("forbidden_keywords", ParamType::Array),
        ("case_sensitive", ParamType::Boolean),
    ];

    pub fn default_config() -> Value {
        json!({"required_keywords": [], "forbidden_keywords": [], "case_sensitive": false})
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, KeywordSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let conversation = data.into_conversation();
        let assessment = assess(conversation.response_text(), &settings);
        Ok(Self { params, assessment })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Keyword",
            description: "Checks for required and forbidden keywords in the response",
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

fn assess(text: &str, settings: &KeywordSettings) -> Assessment {
    let (found, missing): (Vec<&String>, Vec<&String>) = settings
        .required_keywords
        .iter()
        .partition(|keyword| contains(text, keyword, settings.case_sensitive));
    let forbidden: Vec<&String> = settings
        .forbidden_keywords
        .iter()
        .filter(|keyword| contains(text, keyword, settings.case_sensitive))
        .collect();

    let score = if forbidden.is_empty() {
        weighted(found.len(), settings.required_keywords.len(), 100.0)
    } else {
        0.0
    };

    let mut lines = Vec::new();
    if !settings.required_keywords.is_empty() {
        lines.push(format!(
            "{} Found {}/{} required keywords",
            mark(missing.is_empty()),
            found.len(),
            settings.required_keywords.len()
        ));
        if !missing.is_empty() {
            lines.push(format!(
                "Missing: {}",
                missing.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
            ));
        }
    }
    if !forbidden.is_empty() {
        lines.push(format!(
            "✗ Contains forbidden keywords: {}",
            forbidden.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    if lines.is_empty() {
        lines.push("✓ No keyword requirements violated".to_string());
    }

    Assessment::new(
        score,
        lines.join("\n"),
        json!({
            "required_found": found,
            "required_missing": missing,
            "forbidden_found": forbidden,
            "case_sensitive": settings.case_sensitive,
        }),
    )
}

#[async_trait]
impl Evaluator for KeywordEvaluator {
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

    fn evaluate(text: &str, config: Value) -> Assessment {
        KeywordEvaluator::new(text.into(), config.as_object().unwrap())
            .unwrap()
            .assessment
    }

    #[test]
    fn test_required_fraction_case_insensitive() {
        let assessment = evaluate(
            "Refunds are processed within 5 BUSINESS days.",
            json!({"required_keywords": "refund\nbusiness days\nreceipt"}),
        );
        assert!((assessment.score - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(assessment.metadata["required_missing"], json!(["receipt"]));
    }

    #[test]
    fn test_forbidden_zeroes_score() {
        let assessment = evaluate(
            "As an AI language model, refunds take 5 days.",
            json!({"required_keywords": ["refunds"], "forbidden_keywords": ["as an ai"]}),
        );
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.metadata["forbidden_found"], json!(["as an ai"]));
    }

    #[test]
    fn test_case_sensitive() {
        let assessment = evaluate("Rust", json!({"required_keywords": ["rust"], "case_sensitive": "1"}));
        assert_eq!(assessment.score, 0.0);
    }

    #[test]
    fn test_no_requirements_is_full_score() {
        assert_eq!(evaluate("anything", json!({})).score, 100.0);
    }
}
