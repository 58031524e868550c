use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use prompt_tracker_core::{ApiCapabilities, EvaluatorConfig, TrackerConfig};
use prompt_tracker_evaluators::{ApiCompatibility, EvaluatorContext, EvaluatorRegistry};
use prompt_tracker_normalizers::normalizer_for;
use prompt_tracker_workflow::{EvaluationRunner, InMemoryEvaluationStore, RunReport};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::cli::{parse_target, OutputFormat};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn evaluate(
    config: &TrackerConfig,
    provider: &str,
    api: &str,
    input: &Path,
    evaluators: &Path,
    strict: bool,
    output: OutputFormat,
) -> Result<()> {
    let target = parse_target(provider, api)?;
    let normalizer =
        normalizer_for(target).with_context(|| format!("No normalizer for {}", target))?;
    let payload: serde_json::Value = read_json(input)?;
    let configs: Vec<EvaluatorConfig> = read_json(evaluators)?;

    let context = EvaluatorContext::from_config(config, None)
        .context("Real judging needs a judge client; unset PROMPT_TRACKER_USE_REAL_LLM")?;
    let runner = EvaluationRunner::new(
        EvaluatorRegistry::builtin(),
        context,
        Arc::new(InMemoryEvaluationStore::new()),
    )
    .with_max_concurrency(config.max_concurrency);

    tracing::info!("Evaluating {} payload from {}", target, input.display());
    let report = runner.run(normalizer.normalize(&payload), &configs).await?;
    print_report(&report, output)?;

    if strict && !report.passed() {
        bail!(
            "{} of {} evaluators did not pass",
            report.results.iter().filter(|r| !r.passed).count() + report.failures.len(),
            report.results.len() + report.failures.len()
        );
    }
    Ok(())
}

fn print_report(report: &RunReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            for result in &report.results {
                println!(
                    "{} {:<20} {:>6.1}",
                    if result.passed { "PASS" } else { "FAIL" },
                    result.evaluator_type,
                    result.score
                );
                if let Some(feedback) = &result.feedback {
                    for line in feedback.lines() {
                        println!("     {}", line);
                    }
                }
            }
            for failure in &report.failures {
                println!("ERR  {:<20} {}", failure.evaluator_key, failure.error);
            }
            match report.average_score() {
                Some(average) => println!(
                    "\naverage {:.1}, pass rate {:.0}%",
                    average,
                    report.pass_rate() * 100.0
                ),
                None => println!("\nno results"),
            }
        }
    }
    Ok(())
}

pub fn list_evaluators(provider: Option<&str>, api: Option<&str>, output: OutputFormat) -> Result<()> {
    let registry = EvaluatorRegistry::builtin();
    let descriptors = match (provider, api) {
        (Some(provider), Some(api)) => registry.for_api(parse_target(provider, api)?),
        _ => registry.all().iter().collect(),
    };

    match output {
        OutputFormat::Json => {
            let items: Vec<_> = descriptors
                .iter()
                .map(|d| {
                    json!({
                        "key": d.key,
                        "name": d.name,
                        "description": d.description,
                        "category": d.category,
                        "apis": compatibility_label(&d.compatibility),
                        "default_config": (d.default_config)(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for d in descriptors {
                println!("{:<20} {:<20} {}", d.key, d.name, compatibility_label(&d.compatibility));
                println!("     {}", d.description);
            }
        }
    }
    Ok(())
}

fn compatibility_label(compatibility: &ApiCompatibility) -> String {
    match compatibility {
        ApiCompatibility::All => "all apis".to_string(),
        ApiCompatibility::Only(targets) => targets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub fn show_capabilities(provider: &str, api: &str, output: OutputFormat) -> Result<()> {
    let target = parse_target(provider, api)?;
    let tools = ApiCapabilities::builtin_tools_for(target.provider, target.api);
    let panels = ApiCapabilities::playground_ui_for(target.provider, target.api);
    let features = ApiCapabilities::entry(target.provider, target.api)
        .map(|entry| entry.features)
        .unwrap_or(&[]);

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "target": target,
                "builtin_tools": tools,
                "features": features,
                "playground_ui_panels": panels,
            }))?
        ),
        OutputFormat::Text => {
            let join = |names: Vec<&str>| if names.is_empty() { "-".to_string() } else { names.join(", ") };
            println!("{}", target);
            println!("  builtin tools: {}", join(tools.iter().map(|t| t.as_str()).collect()));
            println!("  features:      {}", join(features.iter().map(|f| f.as_str()).collect()));
            println!("  panels:        {}", join(panels.iter().map(|p| p.as_str()).collect()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_read_evaluator_configs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"evaluator_key": "keyword", "config": {{"required_keywords": "refund"}}, "threshold": 50}},
               {{"evaluator_key": "length", "enabled": false}}]"#
        )
        .unwrap();

        let configs: Vec<EvaluatorConfig> = read_json(file.path()).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].threshold, Some(50.0));
        assert!(!configs[1].enabled);
    }

    #[test]
    fn test_read_json_reports_path() {
        let err = read_json::<serde_json::Value>(Path::new("/definitely/missing.json")).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_compatibility_label() {
        assert_eq!(compatibility_label(&ApiCompatibility::All), "all apis");
        let only = ApiCompatibility::Only(vec![prompt_tracker_core::ApiTarget::OPENAI_ASSISTANTS]);
        assert_eq!(compatibility_label(&only), "openai/assistants");
    }
}
