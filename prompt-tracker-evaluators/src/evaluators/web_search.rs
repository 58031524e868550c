use std::collections::BTreeSet;

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

const USAGE_WEIGHT: f64 = 40.0;
const QUERY_WEIGHT: f64 = 30.0;
const DOMAIN_WEIGHT: f64 = 20.0;
const SOURCE_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchSettings {
    pub require_web_search: bool,
    pub expected_queries: Vec<String>,
    pub require_all_queries: bool,
    pub expected_domains: Vec<String>,
    pub require_all_domains: bool,
    #[serde(default)]
    pub min_sources: Option<usize>,
}

/// Weighted check of the provider's built-in web search: whether it ran,
/// what it searched for, where the sources came from and how many there were.
#[derive(Debug)]
pub struct WebSearchEvaluator {
    params: Map<String, Value>,
    assessment: Assessment,
}

impl WebSearchEvaluator {
    pub const KEY: &'static str = "web_search";

    const PARAM_SCHEMA: ParamSchema = &[
        ("require_web_search", ParamType::Boolean),
        ("expected_queries", ParamType::Array),
        ("require_all_queries", ParamType::Boolean),
        ("expected_domains", ParamType::Array),
        ("require_all_domains", ParamType::Boolean),
        ("min_sources", ParamType::Integer),
    ];

    pub fn default_config() -> Value {
        json!({
            "require_web_search": true,
            "expected_queries": [],
            "require_all_queries": false,
            "expected_domains": [],
            "require_all_domains": false,
        })
    }

    pub fn new(data: EvaluationData, config: &Map<String, Value>) -> Result<Self> {
        let (params, settings): (_, WebSearchSettings) =
            resolve_config(Self::KEY, config, Self::PARAM_SCHEMA, &Self::default_config())?;
        let assessment = assess(&data.into_conversation(), &settings);
        Ok(Self { params, assessment })
    }

    pub fn descriptor() -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            key: Self::KEY,
            name: "Web Search",
            description: "Checks the built-in web search tool was used as expected",
            category: EvaluatorCategory::ToolUsage,
            compatibility: ApiCompatibility::Only(ApiCapabilities::apis_with_builtin_tool(
                BuiltinTool::WebSearch,
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

/// Slot score for a list of expectations: AND scales by the fraction
/// matched, OR is all or nothing. No expectations earns the full weight.
fn expectation_score(matched: usize, expected: usize, require_all: bool, weight: f64) -> f64 {
    if expected == 0 || require_all {
        weighted(matched, expected, weight)
    } else if matched > 0 {
        weight
    } else {
        0.0
    }
}

fn assess(conversation: &NormalizedConversation, settings: &WebSearchSettings) -> Assessment {
    let searches = conversation.all_web_search_results();
    let queries: Vec<&str> = searches.iter().filter_map(|s| s.query.as_deref()).collect();
    let sources: Vec<_> = searches.iter().flat_map(|s| s.sources.iter()).collect();
    let domains: BTreeSet<String> = sources.iter().map(|source| source.domain()).collect();

    if settings.require_web_search && searches.is_empty() {
        return Assessment::new(
            0.0,
            "✗ Web search was not used",
            json!({
                "search_count": 0,
                "queries": [],
                "source_count": 0,
                "domains": [],
            }),
        );
    }

    // Past the floor, usage either happened or was optional.
    let used = !searches.is_empty();
    let usage_score = USAGE_WEIGHT;

    let (queries_found, queries_missing): (Vec<&String>, Vec<&String>) =
        settings.expected_queries.iter().partition(|expected| {
            queries.iter().any(|query| pattern_matches(query, expected, false))
        });
    let query_score = expectation_score(
        queries_found.len(),
        settings.expected_queries.len(),
        settings.require_all_queries,
        QUERY_WEIGHT,
    );

    let (domains_found, domains_missing): (Vec<&String>, Vec<&String>) =
        settings.expected_domains.iter().partition(|expected| {
            let expected = expected.trim().trim_start_matches("www.").to_ascii_lowercase();
            domains
                .iter()
                .any(|domain| *domain == expected || domain.ends_with(&format!(".{}", expected)))
        });
    let domain_score = expectation_score(
        domains_found.len(),
        settings.expected_domains.len(),
        settings.require_all_domains,
        DOMAIN_WEIGHT,
    );

    let source_score = match settings.min_sources {
        Some(min) if sources.len() < min => 0.0,
        _ => SOURCE_WEIGHT,
    };

    let mut lines = vec![format!(
        "{} Web search used {} time(s), {} source(s)",
        mark(used),
        searches.len(),
        sources.len()
    )];
    if !settings.expected_queries.is_empty() {
        lines.push(format!(
            "{} Matched {}/{} expected queries",
            mark(query_score >= QUERY_WEIGHT),
            queries_found.len(),
            settings.expected_queries.len()
        ));
    }
    if !settings.expected_domains.is_empty() {
        lines.push(format!(
            "{} Matched {}/{} expected domains",
            mark(domain_score >= DOMAIN_WEIGHT),
            domains_found.len(),
            settings.expected_domains.len()
        ));
    }
    if let Some(min) = settings.min_sources {
        lines.push(format!(
            "{} {} source(s), minimum {}",
            mark(source_score > 0.0),
            sources.len(),
            min
        ));
    }

    Assessment::new(
        usage_score + query_score + domain_score + source_score,
        lines.join("\n"),
        json!({
            "search_count": searches.len(),
            "queries": queries,
            "source_count": sources.len(),
            "domains": domains,
            "queries_found": queries_found,
            "queries_missing": queries_missing,
            "domains_found": domains_found,
            "domains_missing": domains_missing,
            "score_breakdown": {
                "usage": usage_score,
                "queries": query_score,
                "domains": domain_score,
                "sources": source_score,
            },
        }),
    )
}

#[async_trait]
impl Evaluator for WebSearchEvaluator {
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
