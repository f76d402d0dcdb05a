//! Last-resort answers from the language model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{AdapterError, SourceAdapter};
use crate::llm::{LlmClient, Message};
use crate::resolve::types::{Answer, Query, Source};

const CONFIDENCE: f64 = 0.55;

const SYSTEM_PROMPT: &str = r#"You are a patient mathematics tutor. Solve the learner's problem step by step.

Rules:
- Number each step and show the working, not only the result.
- Use plain text math notation (x^2, sqrt(x), pi) that reads well in chat.
- State the final answer on its own line, starting with "Answer:".
- If the problem is ambiguous, say which reading you solved.
- Stay on mathematics. Decline anything else in one sentence."#;

/// Replies that mean the model did not actually answer.
const REFUSAL_PATTERNS: &[&str] = &[
    "i cannot help",
    "i can't help",
    "i'm unable to",
    "i am unable to",
    "as an ai language model",
];

pub struct GenerativeAdapter {
    llm: Arc<LlmClient>,
}

impl GenerativeAdapter {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

pub fn build_messages(query: &Query) -> Vec<Message> {
    let mut prompt = format!("Problem: {}", query.text());
    if let Some(context) = query.context() {
        prompt.push_str("\n\nAdditional context:\n");
        prompt.push_str(context);
    }
    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}

/// Strip reasoning blocks some local models emit before the answer.
fn clean_completion(raw: &str) -> String {
    let mut text = raw.to_string();
    while let (Some(start), Some(end)) = (text.find("<think>"), text.find("</think>")) {
        if end < start {
            break;
        }
        text.replace_range(start..end + "</think>".len(), "");
    }
    text.trim().to_string()
}

fn is_refusal(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    REFUSAL_PATTERNS.iter().any(|p| lower.starts_with(p))
}

#[async_trait]
impl SourceAdapter for GenerativeAdapter {
    fn source(&self) -> Source {
        Source::Generative
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        let raw = self
            .llm
            .chat(&build_messages(query))
            .await
            .map_err(|e| AdapterError::transient(Source::Generative, format!("{:#}", e)))?;

        let content = clean_completion(&raw);
        if content.is_empty() || is_refusal(&content) {
            return Err(AdapterError::transient(
                Source::Generative,
                "model returned no usable solution",
            ));
        }
        debug!(model = self.llm.model(), len = content.len(), "solution generated");
        Ok(Answer::hit(Source::Generative, content, CONFIDENCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let query = Query::new("Factor x^2 - 9", Some("Learner comment: show the identity"));
        let messages = build_messages(&query);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.starts_with("Problem: Factor x^2 - 9"));
        assert!(messages[1].content.contains("show the identity"));

        let bare = build_messages(&Query::new("Factor x^2 - 9", None));
        assert!(!bare[1].content.contains("Additional context"));
    }

    #[test]
    fn test_clean_completion_drops_reasoning() {
        let raw = "<think>hmm, difference of squares</think>\nStep 1: x^2 - 9 = (x - 3)(x + 3)";
        assert_eq!(clean_completion(raw), "Step 1: x^2 - 9 = (x - 3)(x + 3)");
        assert_eq!(clean_completion("  </think> odd <think> "), "</think> odd <think>");
    }

    #[test]
    fn test_refusals_detected() {
        assert!(is_refusal("I'm unable to solve that."));
        assert!(!is_refusal("Step 1: note that I'm unable to divide by zero, so x != 0"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let llm = LlmClient::new("http://127.0.0.1:9/v1".to_string(), "m".to_string(), None).unwrap();
        let adapter = GenerativeAdapter::new(Arc::new(llm));
        let err = adapter.attempt(&Query::new("1+1", None)).await.unwrap_err();
        assert!(matches!(err, AdapterError::Transient { adapter: Source::Generative, .. }));
    }
}
