use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::traits::JudgeClient;

/// Whether judge evaluators talk to a real model or score with the mock.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JudgeMode {
    Real,
    #[default]
    Mock,
}

/// Offline judge. Scores are pseudo-random but seeded from the model and
/// prompt, so the same request always gets the same answer.
#[derive(Debug, Clone)]
pub struct MockJudgeClient {
    min_score: u32,
    max_score: u32,
}

impl MockJudgeClient {
    pub fn new() -> Self {
        Self {
            min_score: 60,
            max_score: 100,
        }
    }

    pub fn with_range(mut self, min_score: u32, max_score: u32) -> Self {
        self.min_score = min_score.min(max_score);
        self.max_score = max_score.max(min_score);
        self
    }

    pub fn score_for(&self, model: &str, prompt: &str) -> u32 {
        let digest = Sha256::new()
            .chain_update(model.as_bytes())
            .chain_update(b"\0")
            .chain_update(prompt.as_bytes())
            .finalize();
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));
        rng.gen_range(self.min_score..=self.max_score)
    }
}

impl Default for MockJudgeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JudgeClient for MockJudgeClient {
    async fn call(&self, model: &str, prompt: &str) -> Result<String> {
        let score = self.score_for(model, prompt);
        tracing::debug!("Mock judge ({}) scored {}", model, score);
        Ok(format!(
            "Score: {}\nFeedback: Mock evaluation (set PROMPT_TRACKER_USE_REAL_LLM=true for real judging).",
            score
        ))
    }

    async fn call_with_schema(&self, model: &str, prompt: &str, _schema: &Value) -> Result<Value> {
        let score = self.score_for(model, prompt);
        tracing::debug!("Mock judge ({}) scored {}", model, score);
        Ok(json!({
            "overall_score": score,
            "feedback": "Mock evaluation (set PROMPT_TRACKER_USE_REAL_LLM=true for real judging).",
        }))
    }
}
