//! Similarity search over a problem dataset.
//!
//! Problems are embedded with a hashed bag-of-words model: each term lands in
//! one of `DIMENSIONS` buckets chosen by its blake3 hash, and vectors are
//! L2-normalized so the dot product is the cosine similarity.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::bank::{load_problems, BankProblem};
use super::{AdapterError, SourceAdapter};
use crate::resolve::types::{Answer, Query, Source};
use crate::text;

pub const DIMENSIONS: usize = 256;

/// Retrieved problems must also share at least this share of the query's terms.
const MIN_RELEVANCE: f64 = 0.5;

const SPECIFIC_TERMS: &[&str] = &[
    "planck",
    "photoelectric",
    "electromagnetic",
    "quantum",
    "derivative",
    "integral",
    "momentum",
    "energy",
];
const CONCEPT_TERMS: &[&str] = &[
    "equation",
    "function",
    "calculus",
    "algebra",
    "geometry",
    "probability",
    "solve",
    "find",
];
const SUBJECTS: &[&str] = &["physics", "chemistry", "mathematics", "math"];

/// Coarse query kind; picks how similar a match must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    SpecificTerm,
    MathematicalConcept,
    GeneralSubject,
    Default,
}

impl QueryClass {
    pub fn of(question: &str) -> Self {
        let lower = question.to_lowercase();
        if SPECIFIC_TERMS.iter().any(|t| lower.contains(t)) {
            QueryClass::SpecificTerm
        } else if CONCEPT_TERMS.iter().any(|t| lower.contains(t)) {
            QueryClass::MathematicalConcept
        } else if SUBJECTS.contains(&lower.trim()) {
            QueryClass::GeneralSubject
        } else {
            QueryClass::Default
        }
    }

    pub fn threshold(&self) -> f32 {
        match self {
            QueryClass::SpecificTerm => 0.35,
            QueryClass::MathematicalConcept => 0.30,
            QueryClass::GeneralSubject | QueryClass::Default => 0.25,
        }
    }
}

pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0f32; DIMENSIONS];
    for term in text::terms(text) {
        let hash = blake3::hash(term.as_bytes());
        let bytes = hash.as_bytes();
        let bucket = u16::from_le_bytes([bytes[0], bytes[1]]) as usize % DIMENSIONS;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub struct VectorIndex {
    problems: Vec<BankProblem>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(problems: Vec<BankProblem>) -> Self {
        let vectors = problems.iter().map(|p| embed(&p.problem)).collect();
        Self { problems, vectors }
    }

    /// Index the dataset at `path`; an empty index when no path is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::new(Vec::new()));
        };
        let problems = load_problems(path)?;
        info!(count = problems.len(), ?path, "dataset indexed");
        Ok(Self::new(problems))
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Most similar relevant problem above the class threshold.
    pub fn search(&self, question: &str) -> Option<(&BankProblem, f32)> {
        let threshold = QueryClass::of(question).threshold();
        let query_vector = embed(question);
        let query_terms = text::terms(question);

        self.problems
            .iter()
            .zip(&self.vectors)
            .map(|(problem, vector)| (problem, cosine(&query_vector, vector)))
            .filter(|(_, similarity)| *similarity >= threshold)
            .filter(|(problem, _)| {
                let (shared, ratio) = text::overlap_ratio(&query_terms, &problem.problem);
                shared > 0 && ratio >= MIN_RELEVANCE
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

pub struct VectorDatasetAdapter {
    index: Arc<VectorIndex>,
}

impl VectorDatasetAdapter {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SourceAdapter for VectorDatasetAdapter {
    fn source(&self) -> Source {
        Source::VectorDataset
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        Ok(match self.index.search(query.text()) {
            Some((problem, similarity)) => {
                let category = if problem.category.is_empty() {
                    "Mathematics"
                } else {
                    problem.category.as_str()
                };
                Answer::hit(
                    Source::VectorDataset,
                    problem.render(),
                    (0.8 + 0.1 * similarity as f64).min(0.9),
                )
                .with_references([format!("Dataset: {}", category)])
            }
            None => Answer::miss(Source::VectorDataset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(question: &str, solution: &str) -> BankProblem {
        BankProblem {
            id: String::new(),
            problem: question.to_string(),
            solution: solution.to_string(),
            category: String::new(),
            difficulty: None,
            tags: Vec::new(),
        }
    }

    fn index() -> VectorIndex {
        VectorIndex::new(vec![
            problem("Find the integral of 2x with respect to x", "x^2 + C"),
            problem("Compute the determinant of a 2 by 2 matrix", "ad - bc"),
            problem("Probability of rolling two sixes with two dice", "1/36"),
        ])
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(QueryClass::of("Evaluate the integral of x"), QueryClass::SpecificTerm);
        assert_eq!(QueryClass::of("solve for y"), QueryClass::MathematicalConcept);
        assert_eq!(QueryClass::of("Math"), QueryClass::GeneralSubject);
        assert_eq!(QueryClass::of("hello"), QueryClass::Default);
        assert_eq!(QueryClass::SpecificTerm.threshold(), 0.35);
        assert_eq!(QueryClass::Default.threshold(), 0.25);
    }

    #[test]
    fn test_embedding_is_normalized_and_deterministic() {
        let a = embed("integral of 2x");
        let b = embed("Integral of 2x?");
        assert_eq!(a, b);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
        assert!(embed("").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_search_finds_similar_problem() {
        let index = index();
        let (found, similarity) = index.search("integral of 2x with respect to x").unwrap();
        assert_eq!(found.solution, "x^2 + C");
        assert!(similarity > 0.8);
    }

    #[test]
    fn test_search_rejects_unrelated() {
        assert!(index().search("who wrote hamlet").is_none());
        assert!(VectorIndex::new(Vec::new()).search("integral of 2x").is_none());
    }

    #[tokio::test]
    async fn test_adapter_confidence_band() {
        let adapter = VectorDatasetAdapter::new(Arc::new(index()));
        let answer = adapter
            .attempt(&Query::new("probability of rolling two sixes with two dice", None))
            .await
            .unwrap();
        assert!(answer.is_hit());
        assert!((0.8..=0.9).contains(&answer.confidence));
        assert_eq!(answer.references, vec!["Dataset: Mathematics".to_string()]);
    }
}
