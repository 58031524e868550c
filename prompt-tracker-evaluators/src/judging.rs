//! Reading scores out of free-text judge responses.

use std::sync::OnceLock;

use prompt_tracker_core::{clamp_score, ConversationMessage, SCORE_MAX, SCORE_MIN};
use regex::Regex;

/// Score used when a judge response contains no usable number.
pub const FALLBACK_SCORE: f64 = 50.0;

fn score_token() -> &'static Regex {
    static SCORE: OnceLock<Regex> = OnceLock::new();
    SCORE.get_or_init(|| Regex::new(r"Score:\s*(\d+(\.\d+)?)").expect("score regex is valid"))
}

fn any_number() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\b\d+(\.\d+)?\b").expect("number regex is valid"))
}

fn feedback_token() -> &'static Regex {
    static FEEDBACK: OnceLock<Regex> = OnceLock::new();
    FEEDBACK.get_or_init(|| Regex::new(r"(?s)Feedback:\s*(.+)").expect("feedback regex is valid"))
}

/// `Score: N` clamped to [0, 100]; otherwise the first number in range;
/// otherwise [`FALLBACK_SCORE`]. Never fails.
pub fn parse_judge_score(text: &str) -> f64 {
    if let Some(score) = score_token()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        return clamp_score(score);
    }

    any_number()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .find(|n| (SCORE_MIN..=SCORE_MAX).contains(n))
        .unwrap_or(FALLBACK_SCORE)
}

/// Text after `Feedback:`, or the whole response when the marker is absent.
pub fn extract_feedback(text: &str) -> String {
    feedback_token()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

/// `role: content` lines, one per message.
pub fn transcript(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Score: 85\nFeedback: solid", 85.0)]
    #[case("Score:92.5", 92.5)]
    #[case("Score: 150\nFeedback: ...", 100.0)]
    #[case("The rating was 87 out of a possible value", 87.0)]
    #[case("Out of 1000 attempts, 42 passed", 42.0)]
    #[case("no numbers here", 50.0)]
    #[case("", 50.0)]
    fn test_parse_judge_score(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(parse_judge_score(text), expected);
    }

    #[test]
    fn test_extract_feedback() {
        assert_eq!(extract_feedback("Score: 80\nFeedback: Clear and\naccurate."), "Clear and\naccurate.");
        assert_eq!(extract_feedback("  Looks fine  "), "Looks fine");
    }
}
