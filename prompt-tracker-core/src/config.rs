use config::{Config as ConfigLoader, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::judge::JudgeMode;

pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o";

/// Process-wide settings. Built once at start-up and passed by reference;
/// nothing in the core reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// Mirrors `PROMPT_TRACKER_USE_REAL_LLM`. When false, judge evaluators
    /// score with the deterministic mock.
    pub use_real_llm: bool,
    pub default_judge_model: String,
    /// Upper bound on evaluators running at once for one response.
    pub max_concurrency: usize,
    pub log_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            use_real_llm: false,
            default_judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            max_concurrency: 8,
            log_level: "info".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Defaults, then `config/default` and `config/local` (both optional),
    /// then `PROMPT_TRACKER_*` environment variables.
    pub fn load() -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("PROMPT_TRACKER").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Defaults overlaid with a single config file; no environment lookup.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::from(path))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn judge_mode(&self) -> JudgeMode {
        if self.use_real_llm {
            JudgeMode::Real
        } else {
            JudgeMode::Mock
        }
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();
        Ok(ConfigLoader::builder()
            .set_default("use_real_llm", defaults.use_real_llm)?
            .set_default("default_judge_model", defaults.default_judge_model)?
            .set_default("max_concurrency", defaults.max_concurrency as u64)?
            .set_default("log_level", defaults.log_level)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert!(!config.use_real_llm);
        assert_eq!(config.default_judge_model, "gpt-4o");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.judge_mode(), JudgeMode::Mock);
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "use_real_llm = true").unwrap();
        writeln!(file, "default_judge_model = \"gpt-4o-mini\"").unwrap();

        let config = TrackerConfig::from_file(file.path()).unwrap();
        assert!(config.use_real_llm);
        assert_eq!(config.default_judge_model, "gpt-4o-mini");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.judge_mode(), JudgeMode::Real);
    }
}
