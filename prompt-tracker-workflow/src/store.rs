use async_trait::async_trait;
use prompt_tracker_core::{EvaluationResult, EvaluationStore, Result};
use tokio::sync::RwLock;

/// Keeps results in memory, in the order they were recorded.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationStore {
    results: RwLock<Vec<EvaluationResult>>,
}

impl InMemoryEvaluationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn results(&self) -> Vec<EvaluationResult> {
        self.results.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[async_trait]
impl EvaluationStore for InMemoryEvaluationStore {
    async fn record(&self, result: &EvaluationResult) -> Result<()> {
        self.results.write().await.push(result.clone());
        Ok(())
    }
}
