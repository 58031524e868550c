use std::collections::BTreeSet;

use async_trait::async_trait;
use prompt_tracker_core::{ApiTarget, EvaluationData, NormalizedConversation, ParamSchema, ParamType, Result};
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{mark, Assessment};
use crate::base::{meets_threshold, resolve_config, threshold_score, weighted, Evaluator};
use crate::registry::{ApiCompatibility, EvaluatorCategory, EvaluatorContext, EvaluatorDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct FileSearchSettings {
    pub expected_files: Vec<String>,
    pub require_all: bool,
    pub require_file_search: bool,
}

/// Case-insensitive exact, substring or `*` glob match of an expected file
/// against a searched file name.
pub fn file_name_matches(expected: &str, actual: &str) -> bool {
    let expected = expected.trim().to_lowercase();
    let actual = actual.trim().to_lowercase();
    if expected.is_empty() {
        return false;
    }
    if expected == actual || actual.contains(&expected) {
        return true;
    }
    if !expected.contains('*') {
        return false;
    }
    let pattern = format!(
        "^{}$",
        expected
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*")
    );
    RegexBuilder::new(&pattern)
        .build()
        .map(|glob| glob.is_match(&actual))
        .unwrap_or(false)
}

/// Which of the expected files the Assistants file search retrieved.
#[derive(Debug)]
pub struct FileSearchEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
    requirement_met: bool,
}

impl FileSearchEvaluator {
    pub const KEY: &'static str = "file_search";

    const PARAM_SCHEMA: ParamSchema = &[
        ("expected_files", ParamType::Array),
        ("require_all", ParamType::Boolean),
        ("require_file_search", ParamType::Boolean),
    ];

    pub fn default_config() -> Value {
        json!({"expected_files": [], "require_all": true, "require_file_search": true})
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, FileSearchSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let (assessment, requirement_met) = assess(&data.into_conversation(), &settings);
        Ok(Self {
            params,
            assessment,
            requirement_met,
        })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "File Search",
            description: "Checks the expected files were retrieved by file search",
            category: EvaluatorCategory::ToolUsage,
            compatibility: ApiCompatibility::Only(vec![ApiTarget::OPENAI_ASSISTANTS]),
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

fn assess(conversation: &NormalizedConversation, settings: &FileSearchSettings) -> (Assessment, bool) {
    let searches = conversation.all_file_search_results();
    let searched: BTreeSet<&str> = searches
        .iter()
        .flat_map(|search| search.hits.iter())
        .filter_map(|hit| hit.display_name())
        .collect();
    let queries: Vec<&String> = searches.iter().flat_map(|search| search.queries.iter()).collect();

    if settings.require_file_search && searches.is_empty() {
        let assessment = Assessment::new(
            0.0,
            "✗ File search was not used",
            json!({"search_count": 0, "files_found": [], "files_missing": settings.expected_files}),
        );
        return (assessment, false);
    }

    let (found, missing): (Vec<&String>, Vec<&String>) = settings
        .expected_files
        .iter()
        .partition(|expected| searched.iter().any(|name| file_name_matches(expected, name)));

    let total = settings.expected_files.len();
    let requirement_met = if settings.require_all {
        missing.is_empty()
    } else {
        total == 0 || !found.is_empty()
    };

    let feedback = format!(
        "{} Found {}/{} expected files across {} search(es)",
        mark(requirement_met),
        found.len(),
        total,
        searches.len()
    );
    let assessment = Assessment::new(
        weighted(found.len(), total, 100.0),
        feedback,
        json!({
            "search_count": searches.len(),
            "queries": queries,
            "searched_files": searched,
            "files_found": found,
            "files_missing": missing,
            "require_all": settings.require_all,
        }),
    );
    (assessment, requirement_met)
}

#[async_trait]
impl Evaluator for FileSearchEvaluator {
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

    async fn passed(&self) -> Result<bool> {
        Ok(match threshold_score(&self.params) {
            Some(threshold) => meets_threshold(self.assessment.score, Some(threshold)),
            None => self.requirement_met,
        })
    }

    async fn metadata(&self) -> Result<Value> {
        Ok(self.assessment.metadata.clone())
    }
}
