//! Curated problem bank: worked solutions matched by exact text or term overlap.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AdapterError, SourceAdapter};
use crate::resolve::types::{Answer, Query, Source};
use crate::text;

const SEED: &str = include_str!("../../data/seed_bank.json");

const EXACT_CONFIDENCE: f64 = 0.99;
const MIN_OVERLAP: f64 = 0.5;
const MIN_SHARED_TERMS: usize = 2;

/// A stored problem with its worked solution. Also the record format of
/// dataset files, hence the aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankProblem {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "question")]
    pub problem: String,
    #[serde(alias = "gold", alias = "answer")]
    pub solution: String,
    #[serde(default, alias = "subject")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BankProblem {
    pub fn render(&self) -> String {
        format!(
            "**Problem:** {}\n\n**Solution:**\n{}",
            self.problem.trim(),
            self.solution.trim()
        )
    }
}

/// Load a JSON array of problems.
pub fn load_problems(path: &Path) -> Result<Vec<BankProblem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read problems from {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse problems in {:?}", path))
}

struct Entry {
    normalized: String,
    problem: BankProblem,
}

pub struct CuratedBank {
    entries: Vec<Entry>,
}

impl CuratedBank {
    pub fn new(problems: Vec<BankProblem>) -> Self {
        let entries = problems
            .into_iter()
            .filter(|p| !p.problem.trim().is_empty() && !p.solution.trim().is_empty())
            .map(|problem| Entry {
                normalized: text::normalize(&problem.problem),
                problem,
            })
            .collect();
        Self { entries }
    }

    /// The built-in seed problems.
    pub fn seeded() -> Self {
        let problems = serde_json::from_str::<Vec<BankProblem>>(SEED).unwrap_or_else(|e| {
            warn!(error = %e, "seed bank unreadable, starting empty");
            Vec::new()
        });
        Self::new(problems)
    }

    /// Seed problems plus those in `path`, when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut bank = Self::seeded();
        if let Some(path) = path {
            let extra = load_problems(path)?;
            info!(count = extra.len(), ?path, "curated problems loaded");
            bank.extend(extra);
        }
        Ok(bank)
    }

    pub fn extend(&mut self, problems: Vec<BankProblem>) {
        let more = Self::new(problems);
        self.entries.extend(more.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best matching problem and its confidence.
    pub fn lookup(&self, question: &str) -> Option<(&BankProblem, f64)> {
        let normalized = text::normalize(question);
        if let Some(entry) = self.entries.iter().find(|e| e.normalized == normalized) {
            return Some((&entry.problem, EXACT_CONFIDENCE));
        }

        let query_terms = text::terms(question);
        let mut best: Option<(&BankProblem, f64)> = None;
        for entry in &self.entries {
            let (shared, ratio) = text::overlap_ratio(&query_terms, &entry.problem.problem);
            if shared < MIN_SHARED_TERMS || ratio < MIN_OVERLAP {
                continue;
            }
            if best.map_or(true, |(_, r)| ratio > r) {
                best = Some((&entry.problem, ratio));
            }
        }
        best.map(|(problem, ratio)| (problem, 0.9 + 0.05 * ratio))
    }
}

pub struct CuratedBankAdapter {
    bank: Arc<CuratedBank>,
}

impl CuratedBankAdapter {
    pub fn new(bank: Arc<CuratedBank>) -> Self {
        Self { bank }
    }
}

#[async_trait]
impl SourceAdapter for CuratedBankAdapter {
    fn source(&self) -> Source {
        Source::CuratedBank
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        Ok(match self.bank.lookup(query.text()) {
            Some((problem, confidence)) => {
                let mut answer = Answer::hit(Source::CuratedBank, problem.render(), confidence);
                if !problem.category.is_empty() {
                    answer = answer.with_references([format!("Curated bank: {}", problem.category)]);
                }
                answer
            }
            None => Answer::miss(Source::CuratedBank),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_parses() {
        let bank = CuratedBank::seeded();
        assert!(bank.len() >= 6);
    }

    #[test]
    fn test_exact_match_ignores_case_and_punctuation() {
        let bank = CuratedBank::seeded();
        let (problem, confidence) = bank
            .lookup("solve the quadratic equation X² + 5x + 6 = 0?")
            .unwrap();
        assert_eq!(confidence, EXACT_CONFIDENCE);
        assert!(problem.solution.contains("x = -2"));
        assert!(problem.solution.contains("x = -3"));
    }

    #[test]
    fn test_overlap_match_prefers_closest_problem() {
        let bank = CuratedBank::seeded();
        let (problem, confidence) = bank.lookup("solve x^2 - 5x + 6 = 0").unwrap();
        assert!(problem.solution.contains("x = 3"));
        assert!((0.9..0.99).contains(&confidence));
    }

    #[test]
    fn test_unrelated_question_misses() {
        let bank = CuratedBank::seeded();
        assert!(bank.lookup("what is a prime ideal in ring theory").is_none());
        // One shared term is not enough.
        assert!(bank.lookup("derivative").is_none());
    }

    #[test]
    fn test_dataset_aliases() {
        let json = r#"[{"question": "Integrate 2x dx", "gold": "x^2 + C", "subject": "math"}]"#;
        let problems: Vec<BankProblem> = serde_json::from_str(json).unwrap();
        assert_eq!(problems[0].problem, "Integrate 2x dx");
        assert_eq!(problems[0].solution, "x^2 + C");
        assert_eq!(problems[0].category, "math");
    }

    #[test]
    fn test_load_merges_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        std::fs::write(
            &path,
            r#"[{"problem": "Evaluate the limit of sin x over x as x approaches 0", "solution": "The limit is 1."}]"#,
        )
        .unwrap();
        let bank = CuratedBank::load(Some(&path)).unwrap();
        let (problem, _) = bank.lookup("limit of sin x over x as x approaches 0").unwrap();
        assert_eq!(problem.solution, "The limit is 1.");
    }

    #[tokio::test]
    async fn test_adapter_renders_problem_and_solution() {
        let adapter = CuratedBankAdapter::new(Arc::new(CuratedBank::seeded()));
        let answer = adapter
            .attempt(&Query::new("Find the area of a circle with radius 5 cm", None))
            .await
            .unwrap();
        assert_eq!(answer.source, Source::CuratedBank);
        assert!(answer.content.starts_with("**Problem:**"));
        assert!(answer.content.contains("78.54"));
        assert_eq!(answer.references, vec!["Curated bank: Geometry".to_string()]);
    }
}
