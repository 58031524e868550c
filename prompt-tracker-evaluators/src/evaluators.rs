pub mod code_interpreter;
pub mod conversation_judge;
pub mod exact_match;
pub mod file_search;
pub mod format;
pub mod keyword;
pub mod length;
pub mod llm_judge;
pub mod pattern_match;
pub mod web_search;

pub use code_interpreter::*;
pub use conversation_judge::*;
pub use exact_match::*;
pub use file_search::*;
pub use format::*;
pub use keyword::*;
pub use length::*;
pub use llm_judge::*;
pub use pattern_match::*;
pub use web_search::*;

use serde_json::Value;

/// Everything a deterministic evaluator reports, computed once when the
/// evaluator is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub feedback: Option<String>,
    pub metadata: Value,
}

impl Assessment {
    pub fn new(score: f64, feedback: impl Into<String>, metadata: Value) -> Self {
        Self {
            score: prompt_tracker_core::clamp_score(score),
            feedback: Some(feedback.into()),
            metadata,
        }
    }
}

/// Tick or cross prefix for feedback lines.
pub(crate) fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}
