use async_trait::async_trait;
use serde_json::Value;

use crate::domain::EvaluationResult;
use crate::error::Result;

/// The external judge model. Implementations own transport, timeouts and
/// retries; evaluators call each method at most once per judgment.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Free-text completion.
    async fn call(&self, model: &str, prompt: &str) -> Result<String>;

    /// Structured-output completion constrained by a JSON schema.
    async fn call_with_schema(&self, model: &str, prompt: &str, schema: &Value) -> Result<Value>;
}

/// Persistence for evaluation results. Append-only.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn record(&self, result: &EvaluationResult) -> Result<()>;
}
