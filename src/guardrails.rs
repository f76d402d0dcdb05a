//! Input and output checks applied around the chat surface.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::warn;

const BANNED_TOPICS: &[&str] = &[
    "weapons",
    "illegal activities",
    "adult content",
    "gambling",
    "drugs",
    "violence",
    "hate speech",
    "discrimination",
];

const MATH_TOPICS: &[&str] = &[
    "algebra",
    "calculus",
    "geometry",
    "trigonometry",
    "statistics",
    "probability",
    "number theory",
    "discrete mathematics",
    "linear algebra",
    "differential equations",
    "mathematical analysis",
    "topology",
    "combinatorics",
    "optimization",
    "numerical analysis",
    "set theory",
    "logic",
    "arithmetic",
];

const ADVANCED_TOPICS: &[&str] = &["calculus", "differential equations", "advanced statistics"];

const SHORT_NOTE: &str = "\n\nNote: This is a simplified answer. For a more detailed explanation, please provide more context or ask for clarification.";
const ADVANCED_NOTE: &str = "\n\nNote: This topic involves advanced mathematical concepts. Consider consulting additional educational resources for deeper understanding.";

static MATH_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\d|[+\-*/^=]|\b[xyz]\b|\b(equation|solve|calculate|prove|integral|derivative|limit|sum|factor|expand|simplify|function)\b",
    )
    .ok()
});
static UNSAFE_CHARS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[<>{}\[\]\\`~]").ok());

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GuardrailError {
    #[error("Your question contains inappropriate content. Please focus on mathematical topics only.")]
    BannedTopic(String),
    #[error("Your question doesn't appear to be about mathematics. Please ask a math question.")]
    NotMath,
    #[error("Please enter a question.")]
    Empty,
}

/// Validate and sanitize a learner's question.
pub fn check_input(question: &str) -> Result<String, GuardrailError> {
    let lower = question.to_lowercase();
    if lower.trim().is_empty() {
        return Err(GuardrailError::Empty);
    }

    if let Some(topic) = BANNED_TOPICS.iter().find(|t| lower.contains(*t)) {
        warn!(topic, "blocked question with banned topic");
        return Err(GuardrailError::BannedTopic(topic.to_string()));
    }

    let is_math = MATH_TOPICS.iter().any(|t| lower.contains(t))
        || MATH_PATTERN.as_ref().is_some_and(|re| re.is_match(&lower));
    if !is_math {
        warn!("blocked non-math question");
        return Err(GuardrailError::NotMath);
    }

    let sanitized = match UNSAFE_CHARS.as_ref() {
        Some(re) => re.replace_all(question, "").into_owned(),
        None => question.to_string(),
    };
    let sanitized = sanitized.trim().to_string();
    if sanitized.is_empty() {
        return Err(GuardrailError::Empty);
    }
    Ok(sanitized)
}

/// Redact banned topics and add a note to very short or advanced answers.
pub fn check_output(answer: &str) -> String {
    let mut out = answer.to_string();
    for topic in BANNED_TOPICS {
        if out.to_lowercase().contains(topic) {
            warn!(topic, "redacting banned topic from answer");
            if let Ok(re) = RegexBuilder::new(&regex::escape(topic)).case_insensitive(true).build() {
                out = re.replace_all(&out, "[redacted]").into_owned();
            }
        }
    }

    let lower = answer.to_lowercase();
    if out.lines().count() < 3 && out.chars().count() < 100 {
        out.push_str(SHORT_NOTE);
    }
    if ADVANCED_TOPICS.iter().any(|t| lower.contains(t)) {
        out.push_str(ADVANCED_NOTE);
    }
    out
}
