use std::sync::Arc;

use prompt_tracker_core::{
    CoreError, EvaluationData, EvaluationResult, EvaluationStore, EvaluatorConfig, Result,
};
use prompt_tracker_evaluators::{EvaluatorContext, EvaluatorRegistry};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::report::{EvaluationFailure, RunReport};

enum Pending {
    Spawned(JoinHandle<Result<EvaluationResult>>),
    NotBuilt(CoreError),
}

/// Runs every configured evaluator against one response or conversation.
///
/// Evaluators run as separate tasks, at most `max_concurrency` at a time,
/// and are reported in config order. One evaluator failing never stops the
/// others; its error lands in [`RunReport::failures`]. Timeouts and retries
/// are left to the judge client.
pub struct EvaluationRunner {
    registry: EvaluatorRegistry,
    context: EvaluatorContext,
    store: Arc<dyn EvaluationStore>,
    max_concurrency: usize,
}

impl EvaluationRunner {
    pub fn new(
        registry: EvaluatorRegistry,
        context: EvaluatorContext,
        store: Arc<dyn EvaluationStore>,
    ) -> Self {
        Self {
            registry,
            context,
            store,
            max_concurrency: 8,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Errors only when the store rejects a result. Results recorded before
    /// the rejection stay in the store; evaluations still pending are aborted.
    pub async fn run(&self, data: EvaluationData, configs: &[EvaluatorConfig]) -> Result<RunReport> {
        let enabled: Vec<&EvaluatorConfig> = configs.iter().filter(|c| c.enabled).collect();
        tracing::info!(
            "Running {} evaluators ({} disabled)",
            enabled.len(),
            configs.len() - enabled.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(enabled.len());

        for config in enabled {
            let key = config.evaluator_key.clone();
            let evaluator = match self.registry.build(config, data.clone(), &self.context) {
                Ok(evaluator) => evaluator,
                Err(e) => {
                    tracing::warn!("Could not build evaluator {}: {}", key, e);
                    handles.push((key, Pending::NotBuilt(e)));
                    continue;
                }
            };

            let semaphore = Arc::clone(&semaphore);
            let mode = config.evaluation_mode;
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CoreError::Internal(format!("Evaluation semaphore closed: {}", e)))?;
                evaluator.evaluate().await.map(|result| result.into_mode(mode))
            });
            handles.push((key, Pending::Spawned(handle)));
        }

        let mut report = RunReport::default();
        let mut handles = handles.into_iter();
        while let Some((key, pending)) = handles.next() {
            let outcome = match pending {
                Pending::NotBuilt(e) => Err(e),
                Pending::Spawned(handle) => handle
                    .await
                    .unwrap_or_else(|e| Err(CoreError::Internal(format!("Evaluation task failed: {}", e)))),
            };

            match outcome {
                Ok(result) => {
                    if let Err(e) = self.store.record(&result).await {
                        for (_, rest) in handles {
                            if let Pending::Spawned(handle) = rest {
                                handle.abort();
                            }
                        }
                        tracing::warn!("Store rejected result from {}, aborting run: {}", key, e);
                        return Err(e);
                    }
                    report.results.push(result);
                }
                Err(e) => {
                    tracing::warn!("Evaluator {} failed: {}", key, e);
                    report.failures.push(EvaluationFailure::new(key, e));
                }
            }
        }

        tracing::info!(
            "Evaluation run finished: {} results, {} failures",
            report.results.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEvaluationStore;
    use serde_json::json;

    fn runner(store: Arc<InMemoryEvaluationStore>) -> EvaluationRunner {
        EvaluationRunner::new(EvaluatorRegistry::builtin(), EvaluatorContext::mock(), store)
            .with_max_concurrency(2)
    }

    #[tokio::test]
    async fn test_results_follow_config_order() {
        let store = Arc::new(InMemoryEvaluationStore::new());
        let configs = vec![
            EvaluatorConfig::new("keyword", json!({"required_keywords": ["refund"]})),
            EvaluatorConfig::new("length", json!({"min_length": 1})),
            EvaluatorConfig::new("exact_match", json!({"expected_output": "nope"})),
        ];

        let report = runner(Arc::clone(&store))
            .run("Your refund is on its way.".into(), &configs)
            .await
            .unwrap();

        let types: Vec<&str> = report.results.iter().map(|r| r.evaluator_type.as_str()).collect();
        assert_eq!(types, vec!["keyword", "length", "exact_match"]);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_disabled_configs_are_skipped() {
        let store = Arc::new(InMemoryEvaluationStore::new());
        let configs = vec![
            EvaluatorConfig::new("keyword", json!({})),
            EvaluatorConfig::new("length", json!({})).disabled(),
        ];
        let report = runner(store).run("hello there".into(), &configs).await.unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_evaluator_is_a_failure_not_an_error() {
        let store = Arc::new(InMemoryEvaluationStore::new());
        let configs = vec![
            EvaluatorConfig::new("sentiment", json!({})),
            EvaluatorConfig::new("keyword", json!({})),
        ];
        let report = runner(Arc::clone(&store)).run("fine".into(), &configs).await.unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.failures[0].evaluator_key, "sentiment");
        assert!(!report.passed());
        assert_eq!(store.len().await, 1);
    }
}
