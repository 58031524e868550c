use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    #[default]
    Scored,
    Binary,
}

/// Which evaluator runs for a configurable owner (a prompt version or a
/// test), and with what parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct EvaluatorConfig {
    #[validate(length(min = 1, max = 255))]
    pub evaluator_key: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub evaluation_mode: EvaluationMode,
    #[validate(range(min = 0.0, max = 100.0))]
    pub threshold: Option<f64>,
}

fn enabled_by_default() -> bool {
    true
}

impl EvaluatorConfig {
    pub fn new(evaluator_key: impl Into<String>, config: Value) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            evaluator_key: evaluator_key.into(),
            config,
            enabled: true,
            evaluation_mode: EvaluationMode::Scored,
            threshold: None,
        }
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.evaluation_mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The config map handed to the evaluator. A record-level threshold
    /// becomes `threshold_score`, overriding the one in the map.
    pub fn effective_config(&self) -> Map<String, Value> {
        let mut config = self.config.clone();
        if let Some(threshold) = self.threshold {
            config.insert("threshold_score".to_string(), Value::from(threshold));
        }
        config
    }
}

/// Output of one evaluator invocation. Append-only: never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub id: Uuid,
    pub evaluator_type: String,
    pub score: f64,
    pub score_min: f64,
    pub score_max: f64,
    pub passed: bool,
    pub feedback: Option<String>,
    pub metadata: Value,
    pub evaluation_mode: EvaluationMode,
    pub created_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn new(
        evaluator_type: impl Into<String>,
        score: f64,
        passed: bool,
        feedback: Option<String>,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            evaluator_type: evaluator_type.into(),
            score: clamp_score(score),
            score_min: SCORE_MIN,
            score_max: SCORE_MAX,
            passed,
            feedback,
            metadata,
            evaluation_mode: EvaluationMode::Scored,
            created_at: Utc::now(),
        }
    }

    /// Binary mode records pass/fail as 100/0 and keeps the raw score in
    /// the metadata.
    pub fn into_mode(self, mode: EvaluationMode) -> Self {
        match mode {
            EvaluationMode::Scored => Self {
                evaluation_mode: mode,
                ..self
            },
            EvaluationMode::Binary => {
                let mut metadata = match self.metadata {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    other => {
                        let mut map = Map::new();
                        map.insert("details".to_string(), other);
                        map
                    }
                };
                metadata.insert("raw_score".to_string(), Value::from(self.score));
                Self {
                    score: if self.passed { SCORE_MAX } else { SCORE_MIN },
                    metadata: Value::Object(metadata),
                    evaluation_mode: mode,
                    ..self
                }
            }
        }
    }
}

/// Clamps into [0, 100]; NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        SCORE_MIN
    } else {
        score.clamp(SCORE_MIN, SCORE_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_bounds() {
        let result = EvaluationResult::new("keyword", 120.0, true, None, json!({}));
        assert_eq!(result.score, 100.0);
        assert_eq!(result.score_min, 0.0);
        assert_eq!(result.score_max, 100.0);
    }

    #[test]
    fn test_binary_mode_keeps_raw_score() {
        let result = EvaluationResult::new("length", 65.0, false, None, json!({"count": 3}))
            .into_mode(EvaluationMode::Binary);

        assert_eq!(result.score, 0.0);
        assert_eq!(result.metadata["raw_score"], json!(65.0));
        assert_eq!(result.metadata["count"], json!(3));
        assert_eq!(result.evaluation_mode, EvaluationMode::Binary);
    }

    #[test]
    fn test_effective_config_threshold_override() {
        let config = EvaluatorConfig::new("keyword", json!({"threshold_score": 50}))
            .with_threshold(90.0);
        assert_eq!(config.effective_config()["threshold_score"], json!(90.0));
    }

    #[test]
    fn test_config_validation() {
        use validator::Validate;

        assert!(EvaluatorConfig::new("keyword", json!({})).validate().is_ok());
        assert!(EvaluatorConfig::new("", json!({})).validate().is_err());
        assert!(EvaluatorConfig::new("keyword", json!({}))
            .with_threshold(150.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: EvaluatorConfig =
            serde_json::from_value(json!({"evaluator_key": "length"})).unwrap();
        assert!(config.enabled);
        assert_eq!(config.evaluation_mode, EvaluationMode::Scored);
        assert!(config.config.is_empty());
        assert!(config.threshold.is_none());
    }
}
