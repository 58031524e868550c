use prompt_tracker_core::EvaluationResult;
use serde::{Deserialize, Serialize};

/// An evaluator that could not produce a result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationFailure {
    pub evaluator_key: String,
    pub error: String,
}

impl EvaluationFailure {
    pub fn new(evaluator_key: impl Into<String>, error: impl ToString) -> Self {
        Self {
            evaluator_key: evaluator_key.into(),
            error: error.to_string(),
        }
    }
}

/// Everything one run produced, in config order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub results: Vec<EvaluationResult>,
    pub failures: Vec<EvaluationFailure>,
}

impl RunReport {
    /// True when every evaluator produced a passing result.
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.results.iter().all(|r| r.passed)
    }

    /// Mean score over the results; `None` when there are none.
    pub fn average_score(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        Some(self.results.iter().map(|r| r.score).sum::<f64>() / self.results.len() as f64)
    }

    /// Passing results over all attempted evaluators, failures included.
    pub fn pass_rate(&self) -> f64 {
        let attempted = self.results.len() + self.failures.len();
        if attempted == 0 {
            return 0.0;
        }
        self.results.iter().filter(|r| r.passed).count() as f64 / attempted as f64
    }
}
