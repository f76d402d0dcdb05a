use serde::{Deserialize, Serialize};

use crate::resolve::types::Answer;

/// Content-addressed document ID (blake3 hex hash).
pub type DocId = String;

/// Metadata for an uploaded study document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub id: DocId,
    pub title: String,
    /// e.g. "url:https://..." or "text"
    pub origin: String,
    pub size: usize,
    pub ingested_at: i64,
}

/// A matching window of document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocExcerpt {
    pub doc_id: DocId,
    pub offset: usize,
    pub content: String,
    /// How many query keywords fall inside this window.
    pub match_count: usize,
}

/// One piece of learner feedback, kept for stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub fingerprint: String,
    pub question: String,
    #[serde(default)]
    pub original_answer: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub correction: Option<String>,
    pub user_id: u64,
    /// True when this feedback produced a patch.
    pub improved: bool,
    pub timestamp: i64,
}

/// A human-approved replacement answer, keyed by question fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackPatch {
    pub answer: Answer,
    pub rating: u8,
    pub created_at: i64,
}

impl FeedbackPatch {
    pub fn new(answer: Answer, rating: u8) -> Self {
        Self {
            answer,
            rating,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}
