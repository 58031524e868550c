use async_trait::async_trait;
use prompt_tracker_core::{
    coerce_params, merge_with_defaults, CoreError, EvaluationResult, ParamSchema, Result,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Pass mark used when no `threshold_score` is configured, as a fraction of
/// the maximum score.
pub const DEFAULT_PASS_RATIO: f64 = 0.8;

/// Scores one response or conversation.
///
/// Implementations are built once per evaluation from `(data, config)` and
/// keep whatever they need to answer every method without repeating work:
/// deterministic evaluators analyse the data up front, judge evaluators
/// memoize the judge call on first use.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn evaluator_type(&self) -> &'static str;

    /// Resolved configuration: coerced, merged over the defaults.
    fn params(&self) -> &Map<String, Value>;

    /// Score in [0, 100].
    async fn evaluate_score(&self) -> Result<f64>;

    async fn generate_feedback(&self) -> Result<Option<String>>;

    async fn passed(&self) -> Result<bool> {
        let score = self.evaluate_score().await?;
        Ok(meets_threshold(score, threshold_score(self.params())))
    }

    /// Structured detail explaining the score.
    async fn metadata(&self) -> Result<Value>;

    async fn evaluate(&self) -> Result<EvaluationResult> {
        let score = self.evaluate_score().await?;
        let passed = self.passed().await?;
        let feedback = self.generate_feedback().await?;
        let metadata = self.metadata().await?;

        tracing::debug!(
            "{} scored {:.1} (passed: {})",
            self.evaluator_type(),
            score,
            passed
        );
        Ok(EvaluationResult::new(
            self.evaluator_type(),
            score,
            passed,
            feedback,
            metadata,
        ))
    }
}

/// `threshold_score` from resolved params, when set to a number or a
/// numeric string.
pub fn threshold_score(params: &Map<String, Value>) -> Option<f64> {
    match params.get("threshold_score")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn meets_threshold(score: f64, threshold: Option<f64>) -> bool {
    match threshold {
        Some(threshold) => score >= threshold,
        None => score / 100.0 >= DEFAULT_PASS_RATIO,
    }
}

/// Coerces `raw` with `schema`, drops keys that coerced to null so their
/// defaults apply, merges over `defaults` and reads the typed settings.
pub fn resolve_config<T: DeserializeOwned>(
    evaluator_type: &str,
    raw: &Map<String, Value>,
    schema: ParamSchema,
    defaults: &Value,
) -> Result<(Map<String, Value>, T)> {
    let coerced: Map<String, Value> = coerce_params(raw, schema)
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect();
    let merged = merge_with_defaults(defaults, &coerced);
    let settings = serde_json::from_value(Value::Object(merged.clone())).map_err(|err| {
        CoreError::Validation(format!("invalid {} config: {}", evaluator_type, err))
    })?;
    Ok((merged, settings))
}

/// Case-insensitive unless told otherwise.
pub(crate) fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Ratio of `part` to `whole` scaled to `weight`, capped at `weight`. An
/// empty `whole` earns the full weight.
pub(crate) fn weighted(part: usize, whole: usize, weight: f64) -> f64 {
    if whole == 0 {
        return weight;
    }
    (part as f64 / whole as f64 * weight).min(weight)
}
