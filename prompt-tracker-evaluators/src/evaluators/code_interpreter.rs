use async_trait::async_trait;
use prompt_tracker_core::{
    ApiCapabilities, BuiltinTool, EvaluationData, NormalizedConversation, ParamSchema, ParamType,
    Result,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::pattern_match::pattern_matches;
use super::{mark, Assessment};
use crate::base::{resolve_config, weighted, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

const EXECUTION_WEIGHT: f64 = 30.0;
const SUCCESS_WEIGHT: f64 = 20.0;
const LANGUAGE_WEIGHT: f64 = 15.0;
const OUTPUT_WEIGHT: f64 = 20.0;
const FILES_WEIGHT: f64 = 10.0;
const LINES_WEIGHT: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
pub struct CodeInterpreterSettings {
    pub require_code_execution: bool,
    #[serde(default)]
    pub expected_language: Option<String>,
    pub expected_output_patterns: Vec<String>,
    pub require_all_patterns: bool,
    pub require_file_creation: bool,
    #[serde(default)]
    pub min_code_lines: Option<usize>,
}

/// Weighted check of code the provider executed on the model's behalf.
#[derive(Debug)]
pub struct CodeInterpreterEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
}

impl CodeInterpreterEvaluator {
    pub const KEY: &'static str = "code_interpreter";

    const PARAM_SCHEMA: ParamSchema = &[
        ("require_code_execution", ParamType::Boolean),
        ("expected_language", ParamType::String),
        ("expected_output_patterns", ParamType::Array),
        ("require_all_patterns", ParamType::Boolean),
        ("require_file_creation", ParamType::Boolean),
        ("min_code_lines", ParamType::Integer),
    ];

    pub fn default_config() -> Value {
        json!({
            "require_code_execution": true,
            "expected_output_patterns": [],
            "require_all_patterns": true,
            "require_file_creation": false,
        })
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, CodeInterpreterSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let assessment = assess(&data.into_conversation(), &settings);
        Ok(Self { params, assessment })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Code Interpreter",
            description: "Checks code execution, its output and any files it created",
            category: EvaluatorCategory::ToolUsage,
            compatibility: ApiCompatibility::Only(ApiCapabilities::apis_with_builtin_tool(
                BuiltinTool::CodeInterpreter,
            )),
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

fn assess(conversation: &NormalizedConversation, settings: &CodeInterpreterSettings) -> Assessment {
    let executions = conversation.all_code_interpreter_results();

    if settings.require_code_execution && executions.is_empty() {
        return Assessment::new(
            0.0,
            "✗ Code interpreter was not used",
            json!({"execution_count": 0}),
        );
    }

    let failed = executions.iter().filter(|e| !e.succeeded()).count();
    let success_score = if failed == 0 { SUCCESS_WEIGHT } else { 0.0 };

    let languages: Vec<&str> = executions
        .iter()
        .filter_map(|e| e.language.as_deref())
        .collect();
    let expected_language = settings
        .expected_language
        .as_deref()
        .map(str::trim)
        .filter(|language| !language.is_empty());
    let language_score = match expected_language {
        Some(expected) if !languages.iter().any(|l| l.eq_ignore_ascii_case(expected)) => 0.0,
        _ => LANGUAGE_WEIGHT,
    };

    let output = executions
        .iter()
        .filter_map(|e| e.output.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    let (patterns_matched, patterns_missing): (Vec<&String>, Vec<&String>) = settings
        .expected_output_patterns
        .iter()
        .partition(|pattern| pattern_matches(&output, pattern, false));
    let output_score = if settings.require_all_patterns || settings.expected_output_patterns.is_empty() {
        weighted(
            patterns_matched.len(),
            settings.expected_output_patterns.len(),
            OUTPUT_WEIGHT,
        )
    } else if patterns_matched.is_empty() {
        0.0
    } else {
        OUTPUT_WEIGHT
    };

    let files: Vec<&String> = executions.iter().flat_map(|e| e.files_created.iter()).collect();
    let files_score = if settings.require_file_creation && files.is_empty() {
        0.0
    } else {
        FILES_WEIGHT
    };

    let code_lines: usize = executions.iter().map(|e| e.code_line_count()).sum();
    let lines_score = match settings.min_code_lines {
        Some(min) if code_lines < min => 0.0,
        _ => LINES_WEIGHT,
    };

    let mut feedback = vec![format!(
        "{} Code executed {} time(s), {} failed",
        mark(!executions.is_empty()),
        executions.len(),
        failed
    )];
    if let Some(expected) = expected_language {
        feedback.push(format!(
            "{} Expected language {}",
            mark(language_score > 0.0),
            expected
        ));
    }
    if !settings.expected_output_patterns.is_empty() {
        feedback.push(format!(
            "{} Output matched {}/{} patterns",
            mark(output_score >= OUTPUT_WEIGHT),
            patterns_matched.len(),
            settings.expected_output_patterns.len()
        ));
    }
    if settings.require_file_creation {
        feedback.push(format!("{} {} file(s) created", mark(!files.is_empty()), files.len()));
    }
    if let Some(min) = settings.min_code_lines {
        feedback.push(format!(
            "{} {} line(s) of code, minimum {}",
            mark(lines_score > 0.0),
            code_lines,
            min
        ));
    }

    Assessment::new(
        EXECUTION_WEIGHT + success_score + language_score + output_score + files_score + lines_score,
        feedback.join("\n"),
        json!({
            "execution_count": executions.len(),
            "failed_count": failed,
            "languages": languages,
            "patterns_matched": patterns_matched,
            "patterns_missing": patterns_missing,
            "files_created": files,
            "code_lines": code_lines,
            "score_breakdown": {
                "execution": EXECUTION_WEIGHT,
                "success": success_score,
                "language": language_score,
                "output": output_score,
                "files": files_score,
                "lines": lines_score,
            },
        }),
    )
}

#[async_trait]
impl Evaluator for CodeInterpreterEvaluator {
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
