use pretty_assertions::assert_eq;
use prompt_tracker_core::*;
use rstest::rstest;
use serde_json::{json, Map, Value};
use test_case::test_case;

// ===== Capability Matrix =====

#[rstest]
#[case("openai", "responses", BuiltinTool::WebSearch, true)]
#[case("openai", "responses", BuiltinTool::FileSearch, true)]
#[case("openai", "assistants", BuiltinTool::WebSearch, false)]
#[case("openai", "assistants", BuiltinTool::CodeInterpreter, true)]
#[case("anthropic", "messages", BuiltinTool::WebSearch, true)]
#[case("openai", "chat_completions", BuiltinTool::WebSearch, false)]
#[case("google", "chat_completions", BuiltinTool::CodeInterpreter, false)]
fn test_builtin_tool_support(
    #[case] provider: &str,
    #[case] api: &str,
    #[case] tool: BuiltinTool,
    #[case] expected: bool,
) {
    let tools = ApiCapabilities::builtin_tools_for_str(provider, api);
    assert_eq!(tools.contains(&tool), expected);
}

#[test]
fn test_unknown_pairs_never_error() {
    assert!(ApiCapabilities::builtin_tools_for_str("cohere", "chat").is_empty());
    assert!(!ApiCapabilities::supports_feature_str("openai", "responses", "telepathy"));
    assert_eq!(
        ApiCapabilities::playground_ui_for_str("cohere", "chat"),
        DEFAULT_PLAYGROUND_PANELS
    );
}

#[test]
fn test_symbol_and_string_spellings_agree() {
    assert_eq!(
        ApiCapabilities::builtin_tools_for_str(":openai", ":assistants"),
        ApiCapabilities::builtin_tools_for(Provider::OpenAi, Api::Assistants)
    );
    assert!(ApiCapabilities::supports_feature_str("OpenAI", "assistants", ":run_steps"));
}

#[test]
fn test_assistants_are_remote_entity_linked() {
    assert!(ApiCapabilities::remote_entity_linked(Provider::OpenAi, Api::Assistants));
    assert!(!ApiCapabilities::remote_entity_linked(Provider::OpenAi, Api::Responses));
}

#[test]
fn test_apis_with_web_search() {
    let targets = ApiCapabilities::apis_with_builtin_tool(BuiltinTool::WebSearch);
    assert_eq!(targets, vec![ApiTarget::OPENAI_RESPONSES, ApiTarget::ANTHROPIC_MESSAGES]);
}

// ===== Parameter Coercion =====

const SCHEMA: ParamSchema = &[
    ("keywords", ParamType::Array),
    ("strict", ParamType::Boolean),
    ("max_length", ParamType::Integer),
    ("schema", ParamType::Json),
    ("count_by", ParamType::Symbol),
];

fn coerce(raw: Value) -> Map<String, Value> {
    coerce_params(raw.as_object().unwrap(), SCHEMA)
}

#[test_case(json!("refund\n\n  order \n"), json!(["refund", "order"]) ; "textarea lines")]
#[test_case(json!(["a", "", " "]), json!(["a"]) ; "blank entries dropped")]
#[test_case(json!(null), json!([]) ; "null is empty")]
#[test_case(json!("single"), json!(["single"]) ; "single line")]
fn test_array_coercion(raw: Value, expected: Value) {
    assert_eq!(coerce(json!({"keywords": raw}))["keywords"], expected);
}

#[test_case(json!("1"), true ; "string one")]
#[test_case(json!("true"), true ; "string true")]
#[test_case(json!(1), true ; "number one")]
#[test_case(json!("0"), false ; "string zero")]
#[test_case(json!("yes"), false ; "other strings")]
fn test_boolean_coercion(raw: Value, expected: bool) {
    assert_eq!(coerce(json!({"strict": raw}))["strict"], json!(expected));
}

#[test]
fn test_integer_and_json_coercion() {
    let params = coerce(json!({
        "max_length": "250",
        "schema": "{\"type\": \"object\"}",
        "count_by": "words",
        "untyped": "kept as is",
    }));
    assert_eq!(params["max_length"], json!(250));
    assert_eq!(params["schema"], json!({"type": "object"}));
    assert_eq!(params["count_by"], json!("words"));
    assert_eq!(params["untyped"], json!("kept as is"));
}

#[test]
fn test_invalid_json_and_integer_become_null() {
    let params = coerce(json!({"max_length": "lots", "schema": "{broken"}));
    assert_eq!(params["max_length"], Value::Null);
    assert_eq!(params["schema"], Value::Null);
}

#[test]
fn test_merge_with_defaults_prefers_explicit() {
    let explicit = coerce(json!({"strict": "1"}));
    let merged = merge_with_defaults(&json!({"strict": false, "max_length": 100}), &explicit);
    assert_eq!(merged["strict"], json!(true));
    assert_eq!(merged["max_length"], json!(100));
}
