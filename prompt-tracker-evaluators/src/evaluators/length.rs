use async_trait::async_trait;
use prompt_tracker_core::{CoreError, EvaluationData, ParamSchema, ParamType, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::Assessment;
use crate::base::{resolve_config, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CountBy {
    #[serde(alias = "chars")]
    Characters,
    Words,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LengthSettings {
    pub min_length: usize,
    pub max_length: usize,
    pub count_by: CountBy,
}

/// Scores the response length against a `[min_length, max_length]` band.
#[derive(Debug)]
pub struct LengthEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
}

impl LengthEvaluator {
    pub const KEY: &'static str = "length";

    const PARAM_SCHEMA: ParamSchema = &[
        ("min_length", ParamType::Integer),
        ("max_length", ParamType::Integer),
        ("count_by", ParamType::Symbol),
    ];

    pub fn default_config() -> Value {
        json!({"min_length": 10, "max_length": 2000, "count_by": "characters"})
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, LengthSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        if settings.min_length > settings.max_length {
            return Err(CoreError::Validation(format!(
                "min_length {} is greater than max_length {}",
                settings.min_length, settings.max_length
            )));
        }

        let conversation = data.into_conversation();
        let assessment = assess(conversation.response_text(), &settings);
        Ok(Self { params, assessment })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Length",
            description: "Checks that the response length falls within a range",
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

fn assess(text: &str, settings: &LengthSettings) -> Assessment {
    let (length, unit) = match settings.count_by {
        CountBy::Characters => (text.chars().count(), "characters"),
        CountBy::Words => (text.split_whitespace().count(), "words"),
    };
    let (min, max) = (settings.min_length, settings.max_length);

    let (score, feedback) = if length < min {
        (
            length as f64 / min as f64 * 100.0,
            format!("Too short: {} {} (minimum {})", length, unit, min),
        )
    } else if length > max {
        (
            max as f64 / length as f64 * 100.0,
            format!("Too long: {} {} (maximum {})", length, unit, max),
        )
    } else {
        (
            100.0,
            format!("Length of {} {} is within {}-{}", length, unit, min, max),
        )
    };

    Assessment::new(
        score,
        feedback,
        json!({
            "length": length,
            "count_by": settings.count_by,
            "min_length": min,
            "max_length": max,
            "within_range": (min..=max).contains(&length),
        }),
    )
}

#[async_trait]
impl Evaluator for LengthEvaluator {
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
