use pretty_assertions::assert_eq;
use prompt_tracker_core::*;
use serde_json::json;

// ===== Evaluation Data Coercion =====

#[test]
fn test_bare_string_becomes_single_assistant_message() {
    let conversation = EvaluationData::from("hello").into_conversation();

    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].role, Role::Assistant);
    assert_eq!(conversation.messages[0].content, "hello");
    assert_eq!(conversation.messages[0].turn, 1);
    assert!(conversation.run_steps.is_none());
}

#[test]
fn test_text_only_hash_becomes_response() {
    let data = EvaluationData::from_value(json!({"text": "Bonjour"}));
    assert_eq!(data.into_conversation().response_text(), "Bonjour");
}

#[test]
fn test_unknown_shapes_degrade_to_empty_text() {
    for value in [json!(42), json!(null), json!({"unrelated": true})] {
        let conversation = EvaluationData::from_value(value).into_conversation();
        assert_eq!(conversation.response_text(), "");
        assert_eq!(conversation.messages.len(), 1);
    }
}

#[test]
fn test_conversation_value_flattens_run_steps() {
    let value = json!({
        "messages": [
            {"role": "user", "content": "Summarize the guidelines", "turn": 1},
            {"role": "assistant", "content": "Cite sources.", "turn": 1}
        ],
        "run_steps": [{
            "id": "step_1",
            "step_type": "tool_calls",
            "file_search_results": [{"hits": [{"file_name": "guidelines.txt"}]}]
        }]
    });

    let conversation = EvaluationData::from_value(value).into_conversation();
    let names: Vec<&str> = conversation
        .all_file_search_results()
        .iter()
        .flat_map(|r| r.hits.iter())
        .filter_map(|h| h.display_name())
        .collect();
    assert_eq!(names, vec!["guidelines.txt"]);
}

#[test]
fn test_tool_usage_tracks_turn_and_index() {
    let messages = vec![
        ConversationMessage::new(Role::User, "weather?", 1),
        ConversationMessage::new(Role::Assistant, "", 1).with_tool_calls(vec![ToolCall::function(
            Some("call_1".to_string()),
            "get_weather",
            json!({"city": "Oslo"}),
        )]),
    ];
    let conversation = NormalizedConversation::from_messages(messages);

    assert_eq!(conversation.tool_usage.len(), 1);
    assert_eq!(conversation.tool_usage[0].turn, 1);
    assert_eq!(conversation.tool_usage[0].message_index, 1);
    assert_eq!(conversation.tool_usage[0].call.function_name.as_deref(), Some("get_weather"));
}

// ===== Serialization =====

#[test]
fn test_message_serialization_uses_wire_names() {
    let message = ConversationMessage::new(Role::Assistant, "ok", 2).with_tool_calls(vec![
        ToolCall::function(None, "lookup", json!({})),
    ]);
    let value = serde_json::to_value(&message).unwrap();

    assert_eq!(value["role"], json!("assistant"));
    assert_eq!(value["turn"], json!(2));
    assert_eq!(value["tool_calls"][0]["type"], json!("function"));

    let back: ConversationMessage = serde_json::from_value(value).unwrap();
    assert_eq!(back, message);
}

#[test]
fn test_message_defaults_when_deserializing() {
    let message: ConversationMessage = serde_json::from_value(json!({"role": "user"})).unwrap();
    assert_eq!(message.content, "");
    assert_eq!(message.turn, 1);
    assert!(message.tool_calls.is_empty());
}

// ===== Evaluator Config Records =====

#[test]
fn test_evaluator_config_deserializes_with_defaults() {
    let config: EvaluatorConfig =
        serde_json::from_value(json!({"evaluator_key": "keyword"})).unwrap();
    assert!(config.enabled);
    assert_eq!(config.evaluation_mode, EvaluationMode::Scored);
    assert!(config.config.is_empty());
    assert_eq!(config.threshold, None);
}

#[test]
fn test_record_threshold_overrides_config_threshold() {
    let config = EvaluatorConfig::new("llm_judge", json!({"threshold_score": 70})).with_threshold(85.0);
    assert_eq!(config.effective_config()["threshold_score"], json!(85.0));
}

#[test]
fn test_scored_mode_keeps_score() {
    let result = EvaluationResult::new("length", 65.0, false, Some("short".to_string()), json!({}))
        .into_mode(EvaluationMode::Scored);
    assert_eq!(result.score, 65.0);
    assert_eq!(result.evaluation_mode, EvaluationMode::Scored);
}

#[test]
fn test_binary_mode_pass_is_max_score() {
    let result = EvaluationResult::new("length", 91.0, true, None, json!(null)).into_mode(EvaluationMode::Binary);
    assert_eq!(result.score, SCORE_MAX);
    assert_eq!(result.metadata, json!({"raw_score": 91.0}));
}
