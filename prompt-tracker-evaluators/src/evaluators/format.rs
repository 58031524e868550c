use std::sync::OnceLock;

use async_trait::async_trait;
use prompt_tracker_core::{EvaluationData, ParamSchema, ParamType, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{mark, Assessment};
use crate::base::{resolve_config, weighted, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedFormat {
    Json,
    Markdown,
    Plain,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatSettings {
    pub expected_format: ExpectedFormat,
    /// Top-level keys for JSON, section headings for Markdown.
    pub required_keys: Vec<String>,
    pub strict: bool,
}

/// Checks the response parses as the declared format.
#[derive(Debug)]
pub struct FormatEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
}

impl FormatEvaluator {
    pub const KEY: &'static str = "format";

    const PARAM_SCHEMA: ParamSchema = &[
        ("expected_format", ParamType::Symbol),
        ("required_keys", ParamType::Array),
        ("strict", ParamType::Boolean),
    ];

    pub fn default_config() -> Value {
        json!({"expected_format": "json", "required_keys": [], "strict": false})
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, FormatSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let conversation = data.into_conversation();
        let text = conversation.response_text();
        let assessment = match settings.expected_format {
            ExpectedFormat::Json => assess_json(text, &settings),
            ExpectedFormat::Markdown => assess_markdown(text, &settings),
            ExpectedFormat::Plain => assess_plain(text),
        };
        Ok(Self { params, assessment })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Format",
            description: "Validates that the response is JSON, Markdown or plain text",
            category: EvaluatorCategory::Format,
            compatibility: ApiCompatibility::All,
            param_schema: Self::PARAM_SCHEMA,
            default_config: Self::default_config,
            build: Self::build,
        }
    }

    fn build(
        data: EvaluationData,
        config: &Map<String, Value>,
        _context: &EvaluatorContext,
    ) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(Self::new(data, config)?))
    }
}

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)```").expect("fenced block regex is valid")
    })
}

fn markdown_syntax() -> &'static Regex {
    static MARKDOWN: OnceLock<Regex> = OnceLock::new();
    MARKDOWN.get_or_init(|| {
        Regex::new(r"(?m)(^\s{0,3}(#{1,6}\s|[-*+]\s|\d+\.\s|>\s|```)|\*\*[^*\n]+\*\*|\[[^\]\n]+\]\([^)\s]+\))")
            .expect("markdown regex is valid")
    })
}

/// Non-strict mode accepts a JSON document wrapped in a fenced code block.
fn json_candidate<'a>(text: &'a str, strict: bool) -> &'a str {
    if !strict {
        if let Some(block) = fenced_block().captures(text).and_then(|c| c.get(1)) {
            return block.as_str().trim();
        }
    }
    text.trim()
}

fn assess_json(text: &str, settings: &FormatSettings) -> Assessment {
    let candidate = json_candidate(text, settings.strict);
    let parsed: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(err) => {
            return Assessment::new(
                0.0,
                format!("✗ Response is not valid JSON: {}", err),
                json!({"format": "json", "valid": false, "error": err.to_string()}),
            )
        }
    };

    let (present, missing): (Vec<&String>, Vec<&String>) = settings
        .required_keys
        .iter()
        .partition(|key| parsed.as_object().is_some_and(|object| object.contains_key(key.as_str())));
    let score = weighted(present.len(), settings.required_keys.len(), 100.0);

    let mut feedback = vec!["✓ Response is valid JSON".to_string()];
    if !settings.required_keys.is_empty() {
        feedback.push(format!(
            "{} {}/{} required keys present",
            mark(missing.is_empty()),
            present.len(),
            settings.required_keys.len()
        ));
    }

    Assessment::new(
        score,
        feedback.join("\n"),
        json!({
            "format": "json",
            "valid": true,
            "keys_present": present,
            "keys_missing": missing,
        }),
    )
}

fn headings(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_lowercase())
        .collect()
}

fn assess_markdown(text: &str, settings: &FormatSettings) -> Assessment {
    let elements = markdown_syntax().find_iter(text).count();
    if elements == 0 {
        return Assessment::new(
            0.0,
            "✗ Response contains no Markdown structure",
            json!({"format": "markdown", "valid": false, "elements": 0}),
        );
    }

    let found_headings = headings(text);
    let (present, missing): (Vec<&String>, Vec<&String>) =
        settings.required_keys.iter().partition(|section| {
            let wanted = section.to_lowercase();
            found_headings.iter().any(|heading| heading.contains(&wanted))
        });
    let score = weighted(present.len(), settings.required_keys.len(), 100.0);

    Assessment::new(
        score,
        format!(
            "✓ Markdown with {} structural elements{}",
            elements,
            if missing.is_empty() {
                String::new()
            } else {
                format!("\n✗ Missing sections: {}", missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))
            }
        ),
        json!({
            "format": "markdown",
            "valid": true,
            "elements": elements,
            "sections_present": present,
            "sections_missing": missing,
        }),
    )
}

fn assess_plain(text: &str) -> Assessment {
    let elements = markdown_syntax().find_iter(text).count();
    let looks_like_json = matches!(
        serde_json::from_str::<Value>(text.trim()),
        Ok(Value::Object(_) | Value::Array(_))
    );
    let plain = !text.trim().is_empty() && elements == 0 && !looks_like_json;

    let feedback = if plain {
        "✓ Response is plain text".to_string()
    } else if text.trim().is_empty() {
        "✗ Response is empty".to_string()
    } else {
        "✗ Response contains structured markup".to_string()
    };
    Assessment::new(
        if plain { 100.0 } else { 0.0 },
        feedback,
        json!({"format": "plain", "valid": plain, "markdown_elements": elements, "json": looks_like_json}),
    )
}

#[async_trait]
impl Evaluator for FormatEvaluator {
    fn evaluator_type(&self) -> &'static str {
        Self::KEY
    }

    fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    async fn evaluate_score(&self) -> Result<f64> {
        Ok(self.assessment.score)
    }

    async fn generate_feedback(&self) -> Result<Option<String>> {
        Ok(self.assessment.feedback.clone())
    }

    async fn metadata(&self) -> Result<Value> {
        Ok(self.assessment.metadata.clone())
    }
}
