//! Chat rendering for resolutions.

use crate::resolve::{Resolution, Stage, FAILURE_MESSAGE, FAILURE_SUGGESTIONS};

/// Discord's limit is 2000; leave room for the client.
pub const CHUNK_LIMIT: usize = 1990;

pub fn render(question: &str, resolution: &Resolution) -> String {
    let answer = &resolution.answer;
    let mut out = format!("**Question:** {}\n", question.trim());

    if resolution.stage == Stage::Failed {
        out.push('\n');
        out.push_str(answer.error.as_deref().unwrap_or(FAILURE_MESSAGE));
        out.push_str("\n\n**Suggestions:**\n");
        let suggestions: Vec<&str> = if answer.references.is_empty() {
            FAILURE_SUGGESTIONS.to_vec()
        } else {
            answer.references.iter().map(String::as_str).collect()
        };
        for suggestion in suggestions {
            out.push_str(&format!("- {}\n", suggestion));
        }
        return out.trim_end().to_string();
    }

    let source = match resolution.cached_from {
        Some(origin) => format!("{} (cached)", origin.label()),
        None => answer.source.label().to_string(),
    };
    out.push_str(&format!(
        "*{} · {:.0}% confidence · {:.1}s*\n\n",
        source,
        answer.confidence * 100.0,
        resolution.elapsed.as_secs_f64()
    ));
    out.push_str(answer.content.trim());

    if !answer.references.is_empty() {
        out.push_str("\n\n**Sources:**\n");
        for reference in &answer.references {
            out.push_str(&format!("- {}\n", reference));
        }
    }
    out.trim_end().to_string()
}

/// Split text into pieces of at most `limit` characters, preferring to break
/// after a newline, then after a space.
pub fn chunk(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let hard = remaining
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let split_at = if hard < remaining.len() {
            remaining[..hard]
                .rfind('\n')
                .or_else(|| remaining[..hard].rfind(' '))
                .map(|i| i + 1)
                .unwrap_or(hard)
        } else {
            hard
        };
        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    chunks
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resolve::types::{Answer, Source};

    fn resolution(answer: Answer, stage: Stage, cached_from: Option<Source>) -> Resolution {
        Resolution {
            answer,
            stage,
            cached_from,
            elapsed: Duration::from_millis(1500),
            target_met: true,
        }
    }

    #[test]
    fn test_render_hit_with_sources() {
        let answer = Answer::hit(Source::Web, "x = 3", 0.75).with_references(["Khan Academy"]);
        let out = render("Solve 2x = 6", &resolution(answer, Stage::BroadSearch, None));
        assert!(out.starts_with("**Question:** Solve 2x = 6"));
        assert!(out.contains("Web search · 75% confidence · 1.5s"));
        assert!(out.contains("x = 3"));
        assert!(out.ends_with("- Khan Academy"));
    }

    #[test]
    fn test_render_cached_shows_origin() {
        let answer = Answer::hit(Source::Cached, "4", 0.99);
        let out = render("2+2", &resolution(answer, Stage::Cache, Some(Source::Formula)));
        assert!(out.contains("Direct calculation (cached)"));
    }

    #[test]
    fn test_render_failure_lists_suggestions() {
        let mut answer = Answer::miss(Source::Generative);
        answer.error = Some(FAILURE_MESSAGE.to_string());
        let out = render("??", &resolution(answer, Stage::Failed, None));
        assert!(out.contains(FAILURE_MESSAGE));
        assert!(out.contains("- Try rephrasing the question"));
        assert!(!out.contains("confidence"));
    }

    #[test]
    fn test_render_failure_uses_carried_suggestions() {
        let mut answer = Answer::miss(Source::Generative).with_references(["Show your working so far"]);
        answer.error = Some(FAILURE_MESSAGE.to_string());
        let out = render("??", &resolution(answer, Stage::Failed, None));
        assert!(out.ends_with("- Show your working so far"));
        assert!(!out.contains("Try rephrasing the question\n"));
    }

    #[test]
    fn test_chunk_respects_limit_and_boundaries() {
        let text = format!("{}\n{}", "a".repeat(10), "b ".repeat(10));
        let chunks = chunk(&text, 12);
        assert_eq!(chunks[0], "aaaaaaaaaa\n");
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunk_handles_multibyte_and_unbroken_text() {
        let text = "π".repeat(25);
        let chunks = chunk(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert!(chunk("", 10).is_empty());
    }
}
