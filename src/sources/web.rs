//! Web search through the Tavily API, restricted to math sites.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AdapterError, SourceAdapter};
use crate::resolve::types::{Answer, Query, Source};

const ENDPOINT: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 3;
const MAX_SENTENCES: usize = 8;
const MAX_CHARS: usize = 800;

const DOMAINS: &[(&str, &str)] = &[
    ("mathsisfun.com", "Math is Fun"),
    ("khanacademy.org", "Khan Academy"),
    ("chegg.com", "Chegg"),
    ("symbolab.com", "Symbolab"),
    ("mathway.com", "Mathway"),
    ("wolframalpha.com", "Wolfram Alpha"),
];

const MATH_WORDS: &[&str] = &[
    "formula", "step", "solve", "answer", "calculate", "solution", "method", "theorem", "rule",
];
const MATH_SYMBOLS: &[char] = &['=', '+', '-', '×', '÷', '²', '³', '√'];

static JUNK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(cookie\s+policy|privacy|advertisement|subscribe|login|menu|navigation|footer|header|sidebar)[^.]*",
    )
    .ok()
});
static VARIABLE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b[xyz]\b").ok());

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: String,
    search_depth: &'static str,
    include_domains: Vec<&'static str>,
    max_results: usize,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

pub struct WebSearchAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl WebSearchAdapter {
    pub fn from_env() -> Result<Self> {
        let api_key = dotenv::var("TAVILY_API_KEY").ok().filter(|k| !k.is_empty());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            api_key,
            endpoint: ENDPOINT.to_string(),
        })
    }

    async fn search(&self, api_key: &str, question: &str) -> Result<SearchResponse, AdapterError> {
        let body = SearchRequest {
            api_key,
            query: format!("complete step by step mathematical solution: {}", question),
            search_depth: "basic",
            include_domains: DOMAINS.iter().map(|(d, _)| *d).collect(),
            max_results: MAX_RESULTS,
            include_answer: true,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::transient(Source::Web, e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Unavailable {
                adapter: Source::Web,
                reason: format!("search key rejected ({})", status),
            });
        }
        if !status.is_success() {
            return Err(AdapterError::transient(
                Source::Web,
                format!("search returned {}", status),
            ));
        }
        resp.json::<SearchResponse>()
            .await
            .map_err(|e| AdapterError::transient(Source::Web, format!("bad search response: {}", e)))
    }
}

#[async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn source(&self) -> Source {
        Source::Web
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Answer::miss(Source::Web));
        };
        let response = self.search(api_key, query.text()).await?;
        debug!(results = response.results.len(), "web search returned");
        Ok(answer_from(response))
    }
}

/// Build an answer from a search response; a miss when nothing usable came back.
pub fn answer_from(response: SearchResponse) -> Answer {
    let usable: Vec<&SearchHit> = response
        .results
        .iter()
        .take(MAX_RESULTS)
        .filter(|hit| hit.content.chars().count() > 50)
        .collect();

    let summary = response
        .answer
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    if usable.is_empty() && summary.is_none() {
        return Answer::miss(Source::Web);
    }

    let combined = usable
        .iter()
        .map(|hit| hit.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let mut content = String::new();
    if let Some(summary) = summary {
        content.push_str("**Answer:** ");
        content.push_str(summary);
        content.push_str("\n\n");
    }
    content.push_str(&distill(&combined));

    let references = usable.iter().map(|hit| site_name(&hit.url));
    let confidence = if summary.is_some() { 0.75 } else { 0.7 };
    Answer::hit(Source::Web, content.trim_end(), confidence).with_references(references)
}

/// Keep the sentences that look like mathematics, minus page furniture.
pub fn distill(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = match JUNK.as_ref() {
        Some(re) => re.replace_all(&collapsed, "").into_owned(),
        None => collapsed,
    };

    let picked: Vec<&str> = cleaned
        .split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() > 15 && looks_mathematical(s))
        .take(MAX_SENTENCES)
        .collect();

    if picked.is_empty() {
        return truncate(&cleaned, 600);
    }
    truncate(&picked.join(". "), MAX_CHARS)
}

fn looks_mathematical(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    MATH_WORDS.iter().any(|w| lower.contains(w))
        || sentence.contains(MATH_SYMBOLS)
        || VARIABLE.as_ref().is_some_and(|re| re.is_match(&lower))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", cut)
}

/// Friendly site name for a result URL.
pub fn site_name(url: &str) -> String {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches("www.");
    if host.is_empty() {
        return "Web Source".to_string();
    }
    if let Some((_, name)) = DOMAINS.iter().find(|(domain, _)| host == *domain) {
        return name.to_string();
    }
    let stem = host
        .trim_end_matches(".com")
        .trim_end_matches(".org");
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Web Source".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, content: &str) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_site_names() {
        assert_eq!(site_name("https://www.khanacademy.org/math/algebra"), "Khan Academy");
        assert_eq!(site_name("https://mathworld.com/x"), "Mathworld");
        assert_eq!(site_name(""), "Web Source");
    }

    #[test]
    fn test_distill_keeps_math_and_drops_furniture() {
        let raw = "Subscribe to our newsletter for updates. \
                   To solve the equation, subtract 4 from both sides. \
                   Our team loves teaching every single day. \
                   Then 2x = 6 and dividing gives x = 3.";
        let out = distill(raw);
        assert!(out.contains("subtract 4 from both sides"));
        assert!(out.contains("x = 3"));
        assert!(!out.contains("newsletter"));
        assert!(!out.contains("loves teaching"));
    }

    #[test]
    fn test_distill_caps_length() {
        let raw = "The answer is x = 1 for this step. ".repeat(100);
        assert!(distill(&raw).chars().count() <= MAX_CHARS);
    }

    #[test]
    fn test_answer_confidence_depends_on_summary() {
        let page = "Step 1: expand the square so (x + 1)² = x² + 2x + 1 and simplify.";
        let with_summary = answer_from(SearchResponse {
            answer: Some("x = -1".to_string()),
            results: vec![hit("https://www.symbolab.com/solver", page)],
        });
        assert_eq!(with_summary.confidence, 0.75);
        assert!(with_summary.content.starts_with("**Answer:** x = -1"));
        assert_eq!(with_summary.references, vec!["Symbolab".to_string()]);

        let without = answer_from(SearchResponse {
            answer: None,
            results: vec![hit("https://www.mathsisfun.com/algebra", page)],
        });
        assert_eq!(without.confidence, 0.7);
    }

    #[test]
    fn test_empty_response_is_miss() {
        let answer = answer_from(SearchResponse {
            answer: None,
            results: vec![hit("https://chegg.com", "too short")],
        });
        assert!(!answer.found);
    }

    #[test]
    fn test_response_parses() {
        let json = r#"{"query": "q", "answer": null, "results": [{"title": "t", "url": "https://chegg.com/a", "content": "c", "score": 0.9}]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.answer.is_none());
        assert_eq!(parsed.results.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_a_miss() {
        let adapter = WebSearchAdapter {
            client: reqwest::Client::new(),
            api_key: None,
            endpoint: ENDPOINT.to_string(),
        };
        let answer = adapter.attempt(&Query::new("integrate x", None)).await.unwrap();
        assert!(!answer.found);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient() {
        let adapter = WebSearchAdapter {
            client: reqwest::Client::new(),
            api_key: Some("test-key".to_string()),
            endpoint: "http://127.0.0.1:9/search".to_string(),
        };
        let err = adapter
            .attempt(&Query::new("integrate x", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Transient { adapter: Source::Web, .. }));
    }
}
