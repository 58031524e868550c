use prompt_tracker_core::{
    ApiTarget, ConversationMessage, NormalizedConversation, NormalizedResponse, RunStep,
};
use serde_json::Value;

use crate::extract::{
    array_field, base_message, code_interpreter_result_from, content_text, file_search_result_from,
    finish_messages, first_array, messages_of, pick_metadata, str_field, string_field,
    tool_call_from, tool_calls_of,
};
use crate::Normalizer;

const MESSAGE_METADATA_KEYS: &[&str] = &["id", "run_id", "assistant_id", "thread_id", "created_at"];

/// OpenAI Assistants API: thread messages plus run steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantsNormalizer;

impl Normalizer for AssistantsNormalizer {
    fn target(&self) -> ApiTarget {
        ApiTarget::OPENAI_ASSISTANTS
    }

    fn normalize_single_response(&self, raw: &Value) -> NormalizedResponse {
        if let Value::String(text) = raw {
            return NormalizedResponse::from_text(text.clone());
        }

        if !messages_of(raw).is_empty() {
            let conversation = self.normalize_conversation(raw);
            let last = conversation
                .messages
                .iter()
                .rev()
                .find(|m| m.is_assistant());
            return NormalizedResponse {
                text: last.map(|m| m.content.clone()).unwrap_or_default(),
                tool_calls: last.map(|m| m.tool_calls.clone()).unwrap_or_default(),
                web_search_results: Vec::new(),
                file_search_results: conversation.file_search_results,
                code_interpreter_results: conversation.code_interpreter_results,
                metadata: conversation.metadata,
            };
        }

        // A single thread message, or the client wrapper {text, ...}.
        let text = str_field(raw, "text")
            .map(str::to_string)
            .unwrap_or_else(|| content_text(raw.get("content")));
        NormalizedResponse {
            text,
            tool_calls: tool_calls_of(raw),
            web_search_results: Vec::new(),
            file_search_results: array_field(raw, "file_search_results")
                .iter()
                .map(file_search_result_from)
                .collect(),
            code_interpreter_results: array_field(raw, "code_interpreter_results")
                .iter()
                .map(code_interpreter_result_from)
                .collect(),
            metadata: pick_metadata(raw, MESSAGE_METADATA_KEYS),
        }
    }

    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation {
        let mut entries: Vec<&Value> = messages_of(raw).iter().collect();
        let created_at = |entry: &Value| entry.get("created_at").and_then(Value::as_i64);
        if !entries.is_empty() && entries.iter().all(|entry| created_at(*entry).is_some()) {
            entries.sort_by_key(|entry| created_at(*entry));
        }

        let messages = entries
            .into_iter()
            .map(|value| {
                let (message, turn) = base_message(value);
                (message.with_api_metadata(pick_metadata(value, MESSAGE_METADATA_KEYS)), turn)
            })
            .collect();
        let mut messages = finish_messages(messages);

        let steps: Vec<(Option<String>, RunStep)> = first_array(raw, &["run_steps", "steps"])
            .iter()
            .map(|step| (string_field(step, "run_id"), run_step_from(step)))
            .collect();
        for (run_id, step) in &steps {
            attach_function_calls(&mut messages, run_id.as_deref(), step);
        }

        let mut conversation = NormalizedConversation::from_messages(messages);
        conversation.file_search_results = array_field(raw, "file_search_results")
            .iter()
            .map(file_search_result_from)
            .collect();
        conversation.code_interpreter_results = array_field(raw, "code_interpreter_results")
            .iter()
            .map(code_interpreter_result_from)
            .collect();
        if !steps.is_empty() {
            conversation.run_steps = Some(steps.into_iter().map(|(_, step)| step).collect());
        }
        conversation.metadata = pick_metadata(raw, &["thread_id", "assistant_id", "run_id"]);
        conversation.with_flattened_run_steps()
    }
}

fn run_step_from(step: &Value) -> RunStep {
    let details = step.get("step_details").unwrap_or(&Value::Null);
    let status = string_field(step, "status");
    let mut run_step = RunStep {
        id: string_field(step, "id"),
        step_type: str_field(step, "type")
            .or_else(|| str_field(details, "type"))
            .unwrap_or("tool_calls")
            .to_string(),
        status: status.clone(),
        ..Default::default()
    };

    for call in array_field(details, "tool_calls") {
        match str_field(call, "type") {
            Some("file_search") => {
                let mut result = file_search_result_from(call);
                result.status = result.status.or_else(|| status.clone());
                run_step.file_search_results.push(result);
            }
            Some("code_interpreter") => {
                let mut result = code_interpreter_result_from(call);
                result.status = result.status.or_else(|| status.clone());
                run_step.code_interpreter_results.push(result);
            }
            Some("function") => run_step.tool_calls.push(tool_call_from(call)),
            other => tracing::debug!("Skipping run step tool call of type {:?}", other),
        }
    }
    run_step
}

/// Function calls made during a run belong to the assistant message that run
/// produced; without a matching run they go to the last assistant message.
fn attach_function_calls(messages: &mut [ConversationMessage], run_id: Option<&str>, step: &RunStep) {
    if step.tool_calls.is_empty() {
        return;
    }
    let by_run = run_id.and_then(|run_id| {
        messages.iter().position(|m| {
            m.is_assistant() && m.api_metadata.get("run_id").and_then(Value::as_str) == Some(run_id)
        })
    });
    let index = by_run.or_else(|| messages.iter().rposition(|m| m.is_assistant()));
    if let Some(index) = index {
        messages[index].tool_calls.extend(step.tool_calls.iter().cloned());
    }
}
