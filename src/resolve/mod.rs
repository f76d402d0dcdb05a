//! The answer resolution pipeline.
//!
//! A question walks a fixed ladder and stops at the first rung that answers
//! it: human patch, cache, fast local checks (documents and direct
//! calculation), broad parallel search (curated bank, dataset, web), and
//! finally the generative model. Errors on every rung but the last are
//! logged and treated as misses.

pub mod executor;
pub mod monitor;
pub mod ranking;
pub mod types;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cache::{AnswerCache, CacheWriter};
use crate::feedback::PatchStore;
use crate::sources::{AdapterError, SourceAdapter};
use crate::state::TutorConfig;

use executor::{AttemptFuture, AttemptState};
use monitor::{PerformanceMonitor, PerformanceStats};
use types::{Answer, Query, Source};

pub const FAILURE_MESSAGE: &str =
    "I couldn't solve this problem right now. Please try rephrasing your question.";

pub const FAILURE_SUGGESTIONS: &[&str] = &[
    "Try rephrasing the question",
    "Check that all the necessary information is provided",
    "Break the problem into smaller parts",
];

/// Confidence given to human-corrected answers, whatever the patch recorded.
pub const PATCH_CONFIDENCE: f64 = 0.98;

/// Which rung of the ladder produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Patch,
    Cache,
    FastLocal,
    BroadSearch,
    Generative,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Patch => "patch",
            Stage::Cache => "cache",
            Stage::FastLocal => "fast_local",
            Stage::BroadSearch => "broad_search",
            Stage::Generative => "generative",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `solve` hands back: exactly one answer plus how it was reached.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub answer: Answer,
    pub stage: Stage,
    /// Original source of a cached answer.
    pub cached_from: Option<Source>,
    pub elapsed: Duration,
    pub target_met: bool,
}

impl Resolution {
    pub fn is_failure(&self) -> bool {
        self.stage == Stage::Failed
    }
}

/// Result of one rung.
#[derive(Debug)]
pub enum PhaseOutcome {
    Hit(Answer),
    Miss,
    Error(AdapterError),
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("generative fallback failed: {0}")]
    FatalGeneration(#[source] AdapterError),
}

/// Adapters grouped by the phase that consults them.
pub struct SourceSet {
    pub fast_local: Vec<Arc<dyn SourceAdapter>>,
    pub broad_search: Vec<Arc<dyn SourceAdapter>>,
    pub generative: Arc<dyn SourceAdapter>,
}

pub struct Resolver {
    patches: Arc<dyn PatchStore>,
    cache: Arc<dyn AnswerCache>,
    writer: CacheWriter,
    sources: SourceSet,
    config: Arc<RwLock<TutorConfig>>,
    monitor: PerformanceMonitor,
}

impl Resolver {
    /// Must be called from within a tokio runtime (spawns the cache writer).
    pub fn new(
        sources: SourceSet,
        patches: Arc<dyn PatchStore>,
        cache: Arc<dyn AnswerCache>,
        config: Arc<RwLock<TutorConfig>>,
    ) -> Self {
        let writer = CacheWriter::spawn(cache.clone());
        Self {
            patches,
            cache,
            writer,
            sources,
            config,
            monitor: PerformanceMonitor::new(),
        }
    }

    /// Resolve a question to exactly one answer.
    pub async fn solve(&self, text: &str, context: Option<&str>) -> Resolution {
        let started = Instant::now();
        let query = Query::new(text, context);
        let config = self.config.read().await.clone();

        info!(fingerprint = %query.fingerprint(), "resolution started");

        if let PhaseOutcome::Hit(answer) = self.check_patch(&query).await {
            return self.finish(&query, answer, Stage::Patch, None, started, &config);
        }

        if let PhaseOutcome::Hit(mut answer) = self.check_cache(&query).await {
            let origin = answer.source;
            answer.source = Source::Cached;
            return self.finish(&query, answer, Stage::Cache, Some(origin), started, &config);
        }

        if let PhaseOutcome::Hit(answer) = self.fast_local(&query, &config).await {
            return self.complete(&query, answer, Stage::FastLocal, started, &config);
        }

        if let PhaseOutcome::Hit(answer) = self.broad_search(&query, &config).await {
            return self.complete(&query, answer, Stage::BroadSearch, started, &config);
        }

        match self.generate(&query).await {
            Ok(answer) => self.complete(&query, answer, Stage::Generative, started, &config),
            Err(e) => {
                error!(fingerprint = %query.fingerprint(), error = %e, "resolution failed");
                let answer = Answer {
                    found: false,
                    content: String::new(),
                    source: Source::Generative,
                    confidence: 0.0,
                    references: FAILURE_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
                    error: Some(FAILURE_MESSAGE.to_string()),
                };
                self.finish(&query, answer, Stage::Failed, None, started, &config)
            }
        }
    }

    /// The answer currently cached for a question, if any.
    pub async fn cached(&self, text: &str) -> Option<Answer> {
        let query = Query::new(text, None);
        match self.check_cache(&query).await {
            PhaseOutcome::Hit(answer) => Some(answer),
            _ => None,
        }
    }

    /// Timings of every resolution since start-up.
    pub fn performance(&self) -> PerformanceStats {
        self.monitor.snapshot()
    }

    /// Wait for queued cache writes to land.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    async fn check_patch(&self, query: &Query) -> PhaseOutcome {
        match self.patches.get(query.fingerprint()).await {
            Ok(Some(patch)) => {
                let mut answer = patch.answer;
                answer.source = Source::Patched;
                answer.found = true;
                answer.confidence = PATCH_CONFIDENCE;
                PhaseOutcome::Hit(answer)
            }
            Ok(None) => PhaseOutcome::Miss,
            Err(e) => {
                warn!(fingerprint = %query.fingerprint(), error = %e, "patch lookup failed");
                PhaseOutcome::Error(AdapterError::Other(e))
            }
        }
    }

    async fn check_cache(&self, query: &Query) -> PhaseOutcome {
        match self.cache.get(query.fingerprint()).await {
            Ok(Some(answer)) if answer.is_hit() => PhaseOutcome::Hit(answer),
            Ok(_) => PhaseOutcome::Miss,
            Err(e) => {
                warn!(fingerprint = %query.fingerprint(), error = %e, "cache lookup failed");
                PhaseOutcome::Error(AdapterError::Other(e))
            }
        }
    }

    async fn fast_local(&self, query: &Query, config: &TutorConfig) -> PhaseOutcome {
        let outcomes = self
            .run_group(&self.sources.fast_local, query, config.fast_deadline())
            .await;
        Self::conclude("fast_local", outcomes, config.min_confidence)
    }

    async fn broad_search(&self, query: &Query, config: &TutorConfig) -> PhaseOutcome {
        let outcomes = self
            .run_group(&self.sources.broad_search, query, config.search_deadline())
            .await;
        Self::conclude("broad_search", outcomes, 0.0)
    }

    async fn generate(&self, query: &Query) -> Result<Answer, ResolveError> {
        let answer = self
            .sources
            .generative
            .attempt(query)
            .await
            .map_err(ResolveError::FatalGeneration)?;
        if answer.is_hit() {
            Ok(answer)
        } else {
            Err(ResolveError::FatalGeneration(AdapterError::transient(
                Source::Generative,
                "model returned no usable answer",
            )))
        }
    }

    async fn run_group(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
        query: &Query,
        deadline: Duration,
    ) -> BTreeMap<String, AttemptState> {
        let tasks: Vec<(String, AttemptFuture)> = adapters
            .iter()
            .map(|adapter| {
                let adapter = adapter.clone();
                let query = query.clone();
                let name = adapter.source().as_str().to_string();
                let attempt = async move { adapter.attempt(&query).await }.boxed();
                (name, attempt)
            })
            .collect();
        executor::run(tasks, deadline).await
    }

    /// Log what a phase saw and turn it into an outcome.
    fn conclude(
        phase: &str,
        outcomes: BTreeMap<String, AttemptState>,
        min_confidence: f64,
    ) -> PhaseOutcome {
        for (name, state) in &outcomes {
            match state {
                AttemptState::Failed(e) => warn!(phase, source = %name, error = %e, "source failed"),
                AttemptState::TimedOut => debug!(phase, source = %name, "source timed out"),
                AttemptState::Completed(a) => {
                    debug!(phase, source = %name, found = a.found, confidence = a.confidence, "source completed")
                }
            }
        }

        if let Some(winner) = ranking::select(&outcomes, min_confidence) {
            info!(phase, source = %winner.source, confidence = winner.confidence, "phase hit");
            return PhaseOutcome::Hit(winner);
        }

        let all_failed = !outcomes.is_empty()
            && outcomes
                .values()
                .all(|s| matches!(s, AttemptState::Failed(_)));
        if all_failed {
            let first = outcomes.into_values().find_map(|s| match s {
                AttemptState::Failed(e) => Some(e),
                _ => None,
            });
            if let Some(e) = first {
                return PhaseOutcome::Error(e);
            }
        }
        PhaseOutcome::Miss
    }

    fn complete(
        &self,
        query: &Query,
        answer: Answer,
        stage: Stage,
        started: Instant,
        config: &TutorConfig,
    ) -> Resolution {
        self.writer
            .enqueue(query.fingerprint().clone(), answer.clone());
        self.finish(query, answer, stage, None, started, config)
    }

    fn finish(
        &self,
        query: &Query,
        answer: Answer,
        stage: Stage,
        cached_from: Option<Source>,
        started: Instant,
        config: &TutorConfig,
    ) -> Resolution {
        let elapsed = started.elapsed();
        let target_met = elapsed <= config.response_target();
        info!(
            fingerprint = %query.fingerprint(),
            %stage,
            source = %answer.source,
            confidence = answer.confidence,
            elapsed_ms = elapsed.as_millis() as u64,
            target_met,
            "resolution complete"
        );
        self.monitor
            .record(query.fingerprint(), stage, elapsed, target_met);
        Resolution {
            answer,
            stage,
            cached_from,
            elapsed,
            target_met,
        }
    }
}
