use std::collections::HashSet;

/// Words that carry no signal when matching a question against stored problems.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "or", "of", "in", "on", "at", "to", "for", "with", "the", "is", "are",
    "be", "by", "it", "its", "what", "which", "where", "when", "does", "do", "have", "that",
    "this", "from", "about", "how", "could", "would", "should", "will", "into", "also", "just",
    "find", "solve", "calculate", "determine", "compute", "evaluate", "show", "give", "me",
    "please", "help", "value", "following",
];

/// Normalize a question for fingerprinting and exact matching.
///
/// Lowercases, collapses whitespace runs to one space, and drops trailing
/// sentence punctuation so "Solve x+1=2?" and "solve  x+1=2" collapse together.
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(|c: char| matches!(c, '?' | '.' | '!') || c.is_whitespace())
        .to_string()
}

/// Meaningful terms of a question, in first-seen order, stop words removed.
///
/// Tokens split on anything that is not alphanumeric or `^`, so `x^2`, `5x`
/// and `x²` survive as single terms.
pub fn terms(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let mut seen = HashSet::new();
    normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '^'))
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Search keywords: the longer terms of a question, capped at `limit`.
/// Single characters and bare numbers are too noisy for substring search.
pub fn keywords(text: &str, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = terms(text)
        .into_iter()
        .filter(|t| t.chars().count() > 2 && !t.chars().all(|c| c.is_ascii_digit()))
        .collect();
    out.truncate(limit);
    out
}

/// Fraction of `query_terms` that also appear in `candidate`'s terms.
pub fn overlap_ratio(query_terms: &[String], candidate: &str) -> (usize, f64) {
    if query_terms.is_empty() {
        return (0, 0.0);
    }
    let candidate_terms: HashSet<String> = terms(candidate).into_iter().collect();
    let shared = query_terms
        .iter()
        .filter(|t| candidate_terms.contains(*t))
        .count();
    (shared, shared as f64 / query_terms.len() as f64)
}
