//! Learner feedback and human-improved answers.
//!
//! Poor ratings and explicit corrections turn into patches that the resolver
//! consults before anything else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::AnswerCache;
use crate::resolve::types::{Answer, Fingerprint, Query, Source};
use crate::resolve::PATCH_CONFIDENCE;
use crate::sources::SourceAdapter;
use crate::state::TutorConfig;
use crate::store::types::{FeedbackPatch, FeedbackRecord};

#[async_trait]
pub trait PatchStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<FeedbackPatch>>;
    async fn put(&self, fingerprint: Fingerprint, patch: FeedbackPatch) -> Result<()>;
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait FeedbackLog: Send + Sync {
    async fn record(&self, record: &FeedbackRecord) -> Result<()>;
    async fn records(&self) -> Result<Vec<FeedbackRecord>>;
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub question: String,
    pub original: Option<String>,
    pub rating: u8,
    pub comment: Option<String>,
    pub correction: Option<String>,
    pub user_id: u64,
}

#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub record_id: String,
    pub patched: bool,
    /// The improved solution text, when a patch was written.
    pub improved: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackStats {
    pub total: usize,
    pub average_rating: f64,
    /// Counts for ratings 1 through 5.
    pub distribution: [usize; 5],
    pub patches: usize,
}

pub struct FeedbackService {
    log: Arc<dyn FeedbackLog>,
    patches: Arc<dyn PatchStore>,
    cache: Arc<dyn AnswerCache>,
    generative: Arc<dyn SourceAdapter>,
    config: Arc<RwLock<TutorConfig>>,
    /// Keeps record ids distinct within one clock tick.
    sequence: AtomicU64,
}

impl FeedbackService {
    pub fn new(
        log: Arc<dyn FeedbackLog>,
        patches: Arc<dyn PatchStore>,
        cache: Arc<dyn AnswerCache>,
        generative: Arc<dyn SourceAdapter>,
        config: Arc<RwLock<TutorConfig>>,
    ) -> Self {
        Self {
            log,
            patches,
            cache,
            generative,
            config,
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn submit(&self, request: FeedbackRequest) -> Result<FeedbackOutcome, FeedbackError> {
        if !(1..=5).contains(&request.rating) {
            return Err(FeedbackError::InvalidRating(request.rating));
        }

        let fingerprint = Fingerprint::of(&request.question);
        let threshold = self.config.read().await.patch_rating_threshold;
        let correction = request
            .correction
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let improved = if let Some(text) = correction {
            Some(text.to_string())
        } else if request.rating <= threshold {
            self.regenerate(&request).await
        } else {
            None
        };

        let now = chrono::Utc::now();
        let timestamp = now.timestamp();
        let nanos = now.timestamp_nanos_opt().unwrap_or(i64::from(now.timestamp_subsec_nanos()));
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let record_id = blake3::hash(
            format!("{}:{}:{}:{}", fingerprint, request.user_id, nanos, sequence).as_bytes(),
        )
        .to_hex()[..16]
        .to_string();
        let record = FeedbackRecord {
            id: record_id.clone(),
            fingerprint: fingerprint.as_str().to_string(),
            question: request.question.clone(),
            original_answer: request.original.clone(),
            rating: request.rating,
            comment: request.comment.clone(),
            correction: correction.map(str::to_string),
            user_id: request.user_id,
            improved: improved.is_some(),
            timestamp,
        };
        self.log.record(&record).await?;

        let Some(solution) = improved else {
            info!(%fingerprint, rating = request.rating, "feedback recorded");
            return Ok(FeedbackOutcome {
                record_id,
                patched: false,
                improved: None,
            });
        };

        let answer = Answer::hit(
            Source::Patched,
            format!(
                "**Problem:** {}\n\n**Human-Improved Solution:**\n{}",
                request.question.trim(),
                solution
            ),
            PATCH_CONFIDENCE,
        );
        self.patches
            .put(
                fingerprint.clone(),
                FeedbackPatch::new(answer.clone(), request.rating),
            )
            .await?;
        self.cache.put(fingerprint.clone(), answer).await?;

        info!(%fingerprint, rating = request.rating, "feedback recorded, patch written");
        Ok(FeedbackOutcome {
            record_id,
            patched: true,
            improved: Some(solution),
        })
    }

    /// Ask the model again with the learner's complaint as guidance.
    async fn regenerate(&self, request: &FeedbackRequest) -> Option<String> {
        let mut guidance = String::from(
            "A learner rated a previous solution to this problem as unhelpful. \
             Write a clearer, fully worked solution.",
        );
        if let Some(comment) = request.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            guidance.push_str("\nLearner comment: ");
            guidance.push_str(comment.trim());
        }
        if let Some(original) = request.original.as_deref().filter(|o| !o.trim().is_empty()) {
            guidance.push_str("\nPrevious solution:\n");
            guidance.push_str(original.trim());
        }

        let query = Query::new(&request.question, Some(&guidance));
        match self.generative.attempt(&query).await {
            Ok(answer) if answer.is_hit() => Some(answer.content),
            Ok(_) => {
                warn!(fingerprint = %query.fingerprint(), "regeneration returned nothing");
                None
            }
            Err(e) => {
                warn!(fingerprint = %query.fingerprint(), error = %e, "regeneration failed");
                None
            }
        }
    }

    pub async fn stats(&self) -> Result<FeedbackStats> {
        let records = self.log.records().await?;
        let mut stats = FeedbackStats {
            total: records.len(),
            patches: self.patches.count().await?,
            ..FeedbackStats::default()
        };
        let mut sum = 0u64;
        for record in &records {
            if (1..=5).contains(&record.rating) {
                stats.distribution[record.rating as usize - 1] += 1;
            }
            sum += record.rating as u64;
        }
        if !records.is_empty() {
            stats.average_rating = sum as f64 / records.len() as f64;
        }
        Ok(stats)
    }
}
