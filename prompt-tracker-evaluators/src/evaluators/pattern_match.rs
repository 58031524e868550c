use async_trait::async_trait;
use prompt_tracker_core::{EvaluationData, ParamSchema, ParamType, Result};
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{mark, Assessment};
use crate::base::{contains, meets_threshold, resolve_config, threshold_score, weighted, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct PatternMatchSettings {
    pub patterns: Vec<String>,
    /// AND vs OR matching. Also decides `passed` when no threshold is set:
    /// AND passes only when every pattern matched, so 4 of 5 scores 80 and
    /// still fails.
    pub require_all: bool,
    pub case_sensitive: bool,
}

/// Matches `pattern` as a regex, or as a plain substring when it does not
/// compile.
pub(crate) fn pattern_matches(text: &str, pattern: &str, case_sensitive: bool) -> bool {
    match RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
    {
        Ok(regex) => regex.is_match(text),
        Err(err) => {
            tracing::warn!("Invalid regex {:?}, using substring match: {}", pattern, err);
            contains(text, pattern, case_sensitive)
        }
    }
}

/// Regex patterns over the response, combined with AND or OR.
#[derive(Debug)]
pub struct PatternMatchEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
    requirement_met: bool,
}

impl PatternMatchEvaluator {
    pub const KEY: &'static str = "pattern_match";

    const PARAM_SCHEMA: ParamSchema = &[
        ("patterns", ParamType::Array),
        ("require_all", ParamType::Boolean),
        ("case_sensitive", ParamType::Boolean),
    ];

    pub fn default_config() -> Value {
        json!({"patterns": [], "require_all": true, "case_sensitive": true})
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, PatternMatchSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let conversation = data.into_conversation();
        let text = conversation.response_text();

        let (matched, unmatched): (Vec<&String>, Vec<&String>) = settings
            .patterns
            .iter()
            .partition(|pattern| pattern_matches(text, pattern, settings.case_sensitive));

        let total = settings.patterns.len();
        let (score, requirement_met) = if settings.require_all {
            (weighted(matched.len(), total, 100.0), unmatched.is_empty())
        } else {
            let any = total == 0 || !matched.is_empty();
            (if any { 100.0 } else { 0.0 }, any)
        };

        let feedback = format!(
            "{} Matched {}/{} patterns ({})",
            mark(requirement_met),
            matched.len(),
            total,
            if settings.require_all { "all required" } else { "any required" }
        );
        let assessment = Assessment::new(
            score,
            feedback,
            json!({
                "matched_patterns": matched,
                "unmatched_patterns": unmatched,
                "require_all": settings.require_all,
                "case_sensitive": settings.case_sensitive,
            }),
        );
        Ok(Self {
            params,
            assessment,
            requirement_met,
        })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Pattern Match",
            description: "Matches the response against regular expressions",
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
impl Evaluator for PatternMatchEvaluator {
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

    /// Without an explicit threshold, passing means the AND / OR
    /// requirement itself was met.
    async fn passed(&self) -> Result<bool> {
        Ok(match threshold_score(&self.params) {
            Some(threshold) => meets_threshold(self.assessment.score, Some(threshold)),
            None => self.requirement_met,
        })
    }

    async fn metadata(&self) -> Result<Value> {
        Ok(self.assessment.metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str, config: Value) -> PatternMatchEvaluator {
        PatternMatchEvaluator::new(text.into(), config.as_object().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_and_semantics() {
        let evaluator = build(
            "Order #1234 ships on 2024-05-01",
            json!({"patterns": "#\\d{4}\n\\d{4}-\\d{2}-\\d{2}\nrefund"}),
        );
        assert!((evaluator.evaluate_score().await.unwrap() - 200.0 / 3.0).abs() < 1e-9);
        assert!(!evaluator.passed().await.unwrap());
    }

    #[tokio::test]
    async fn test_and_requires_every_pattern_to_pass() {
        let evaluator = build("a b c d", json!({"patterns": ["a", "b", "c", "d", "e"]}));
        assert_eq!(evaluator.evaluate_score().await.unwrap(), 80.0);
        assert!(!evaluator.passed().await.unwrap());
    }

    #[tokio::test]
    async fn test_or_semantics() {
        let evaluator = build(
            "Order #1234",
            json!({"patterns": ["refund", "#\\d+"], "require_all": false}),
        );
        assert_eq!(evaluator.evaluate_score().await.unwrap(), 100.0);
        assert!(evaluator.passed().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_regex_falls_back_to_substring() {
        let evaluator = build("cost is (approx", json!({"patterns": ["(approx"]}));
        assert_eq!(evaluator.evaluate_score().await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_explicit_threshold_wins() {
        let evaluator = build(
            "alpha beta",
            json!({"patterns": ["alpha", "beta", "gamma"], "threshold_score": 60}),
        );
        assert!(evaluator.passed().await.unwrap());
    }

    #[tokio::test]
    async fn test_case_insensitive() {
        let evaluator = build("HELLO", json!({"patterns": ["^hello$"], "case_sensitive": false}));
        assert_eq!(evaluator.evaluate_score().await.unwrap(), 100.0);
    }
}
