use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use prompt_tracker_core::{
    ConversationMessage, CoreError, EvaluationData, JudgeClient, NormalizedConversation,
    ParamSchema, ParamType, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use crate::base::{resolve_config, Evaluator};
use crate::judging::{extract_feedback, parse_judge_score, transcript};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

const DEFAULT_JUDGE_PROMPT: &str = "Evaluate the assistant's latest message in this conversation \
for relevance, accuracy and helpfulness given everything said before it.";

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationJudgeSettings {
    pub judge_model: Option<String>,
    pub judge_prompt: Option<String>,
}

/// One judge call's outcome for one assistant message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageScore {
    pub message_index: usize,
    pub turn: u32,
    pub score: f64,
    pub feedback: String,
    pub raw_response: String,
}

/// Judges every assistant message with the messages before it as context,
/// and averages the scores.
pub struct ConversationJudgeEvaluator {
    params: Map<String, Value>,
    judge: Arc<dyn JudgeClient>,
    judge_model: String,
    prompts: Vec<(usize, u32, String)>,
    scores: OnceCell<Vec<MessageScore>>,
}

impl ConversationJudgeEvaluator {
    pub const KEY: &'static str = "conversation_judge";

    const PARAM_SCHEMA: ParamSchema = &[
        ("judge_model", ParamType::String),
        ("judge_prompt", ParamType::String),
    ];

    pub fn default_config() -> Value {
        json!({})
    }

    pub fn new(
        data: EvaluationData,
        config: &Map<String, Value>,
        context: &EvaluatorContext,
    ) -> Result<Self> {
        let (params, settings): (_, ConversationJudgeSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let conversation = data.into_conversation();
        let instructions = settings
            .judge_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_JUDGE_PROMPT.to_string());

        let prompts = judge_prompts(&conversation, &instructions);
        if prompts.is_empty() {
            return Err(CoreError::InvalidState(
                "conversation_judge needs at least one assistant message".to_string(),
            ));
        }

        Ok(Self {
            params,
            judge: Arc::clone(&context.judge),
            judge_model: settings
                .judge_model
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| context.default_judge_model.clone()),
            prompts,
            scores: OnceCell::new(),
        })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Conversation Judge",
            description: "Scores each assistant message in context with a judge model",
            category: EvaluatorCategory::Judge,
            compatibility: ApiCompatibility::All,
            param_schema: Self::PARAM_SCHEMA,
            default_config: Self::default_config,
            build: Self::build,
        }
    }

    fn build(
        data: EvaluationData,
        config: &Map<String, Value>,
        context: &EvaluatorContext,
    ) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(Self::new(data, config, context)?))
    }

    /// Per-message scores, in conversation order. The judge is called once
    /// per assistant message, the first time this is awaited.
    pub async fn message_scores(&self) -> Result<&[MessageScore]> {
        let scores = self
            .scores
            .get_or_try_init(|| async {
                tracing::debug!(
                    "Judging {} assistant messages with {}",
                    self.prompts.len(),
                    self.judge_model
                );
                try_join_all(self.prompts.iter().map(|(index, turn, prompt)| async move {
                    let raw = self.judge.call(&self.judge_model, prompt).await?;
                    Ok::<_, CoreError>(MessageScore {
                        message_index: *index,
                        turn: *turn,
                        score: parse_judge_score(&raw),
                        feedback: extract_feedback(&raw),
                        raw_response: raw,
                    })
                }))
                .await
            })
            .await?;
        Ok(scores.as_slice())
    }
}

fn judge_prompts(conversation: &NormalizedConversation, instructions: &str) -> Vec<(usize, u32, String)> {
    conversation
        .messages
        .iter()
        .enumerate()
        .filter(|(_, message)| message.is_assistant())
        .map(|(index, message)| {
            (
                index,
                message.turn,
                build_prompt(instructions, &conversation.messages[..index], message),
            )
        })
        .collect()
}

fn build_prompt(instructions: &str, context: &[ConversationMessage], message: &ConversationMessage) -> String {
    let history = if context.is_empty() {
        "(no prior messages)".to_string()
    } else {
        transcript(context)
    };
    format!(
        "{}\n\nConversation so far:\n{}\n\nAssistant message to evaluate (turn {}):\n{}\n\n\
         Reply in the form:\nScore: <0-100>\nFeedback: <one paragraph>",
        instructions.trim(),
        history,
        message.turn,
        message.content
    )
}

#[async_trait]
impl Evaluator for ConversationJudgeEvaluator {
    fn evaluator_type(&self) -> &'static str {
        Self::KEY
    }

    fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    async fn evaluate_score(&self) -> Result<f64> {
        let scores = self.message_scores().await?;
        Ok(scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64)
    }

    async fn generate_feedback(&self) -> Result<Option<String>> {
        let scores = self.message_scores().await?;
        let lines: Vec<String> = scores
            .iter()
            .map(|s| format!("Turn {} ({:.0}/100): {}", s.turn, s.score, s.feedback))
            .collect();
        Ok(Some(lines.join("\n")))
    }

    async fn metadata(&self) -> Result<Value> {
        let scores = self.message_scores().await?;
        let average = self.evaluate_score().await?;
        Ok(json!({
            "judge_model": self.judge_model,
            "assistant_message_count": scores.len(),
            "average_score": average,
            "message_scores": scores,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prompt_tracker_core::Role;

    #[test]
    fn test_prompts_include_prior_context_only() {
        let conversation = NormalizedConversation::from_messages(vec![
            ConversationMessage::new(Role::User, "first question", 1),
            ConversationMessage::new(Role::Assistant, "first answer", 1),
            ConversationMessage::new(Role::User, "second question", 2),
            ConversationMessage::new(Role::Assistant, "second answer", 2),
        ]);
        let prompts = judge_prompts(&conversation, "Judge it.");

        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].0, 1);
        assert!(prompts[0].2.contains("user: first question"));
        assert!(!prompts[0].2.contains("second question"));
        assert!(prompts[1].2.contains("assistant: first answer"));
        assert_eq!(prompts[1].1, 2);
    }

    #[test]
    fn test_no_assistant_messages_is_an_error() {
        let data = EvaluationData::Conversation(NormalizedConversation::from_messages(vec![
            ConversationMessage::new(Role::User, "hello?", 1),
        ]));
        let result = ConversationJudgeEvaluator::new(data, &Map::new(), &EvaluatorContext::mock());
        assert!(matches!(result, Err(CoreError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_mock_judge_scores_every_message() {
        let evaluator =
            ConversationJudgeEvaluator::new("only answer".into(), &Map::new(), &EvaluatorContext::mock()).unwrap();
        let scores = evaluator.message_scores().await.unwrap();
        assert_eq!(scores.len(), 1);
        assert!((60.0..=100.0).contains(&scores[0].score));
    }
}
