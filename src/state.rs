use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::feedback::FeedbackService;
use crate::resolve::Resolver;
use crate::store::TutorStore;

/// Resolver tuning (admins can modify at runtime).
#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// Shared deadline for the document and direct-calculation checks.
    pub fast_deadline_ms: u64,
    /// Shared deadline for bank, dataset and web search.
    pub search_deadline_ms: u64,
    /// Fast-local hits below this confidence fall through to broad search.
    pub min_confidence: f64,
    /// Soft end-to-end target reported with every resolution.
    pub response_target_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// Ratings at or below this create a patch.
    pub patch_rating_threshold: u8,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            fast_deadline_ms: 1_000,
            search_deadline_ms: 5_000,
            min_confidence: 0.5,
            response_target_ms: 8_000,
            cache_ttl_secs: 3_600,
            cache_capacity: 1_000,
            patch_rating_threshold: 2,
        }
    }
}

impl TutorConfig {
    /// Defaults overridden by `TUTOR_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |key: &str| dotenv::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(v) = var("TUTOR_FAST_DEADLINE_MS") {
            config.fast_deadline_ms = v;
        }
        if let Some(v) = var("TUTOR_SEARCH_DEADLINE_MS") {
            config.search_deadline_ms = v;
        }
        if let Some(v) = var("TUTOR_RESPONSE_TARGET_MS") {
            config.response_target_ms = v;
        }
        if let Some(v) = var("TUTOR_CACHE_TTL_SECS") {
            config.cache_ttl_secs = v;
        }
        if let Some(v) = var("TUTOR_CACHE_CAPACITY") {
            config.cache_capacity = v;
        }
        config
    }

    pub fn fast_deadline(&self) -> Duration {
        Duration::from_millis(self.fast_deadline_ms)
    }

    pub fn search_deadline(&self) -> Duration {
        Duration::from_millis(self.search_deadline_ms)
    }

    pub fn response_target(&self) -> Duration {
        Duration::from_millis(self.response_target_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Apply an admin `param = value` change. Returns an error message for
    /// unknown parameters or out-of-range values.
    pub fn set(&mut self, param: &str, value: u64) -> Result<(), String> {
        match param {
            "fast_deadline_ms" => self.fast_deadline_ms = value,
            "search_deadline_ms" => self.search_deadline_ms = value,
            "response_target_ms" => self.response_target_ms = value,
            "min_confidence_pct" => {
                if value > 100 {
                    return Err("`min_confidence_pct` must be between 0 and 100".to_string());
                }
                self.min_confidence = value as f64 / 100.0;
            }
            "patch_rating_threshold" => {
                if !(1..=5).contains(&value) {
                    return Err("`patch_rating_threshold` must be between 1 and 5".to_string());
                }
                self.patch_rating_threshold = value as u8;
            }
            _ => {
                return Err(format!(
                    "Unknown param `{}`. Valid: {}",
                    param,
                    Self::PARAMS.join(", ")
                ))
            }
        }
        Ok(())
    }

    pub const PARAMS: &'static [&'static str] = &[
        "fast_deadline_ms",
        "search_deadline_ms",
        "response_target_ms",
        "min_confidence_pct",
        "patch_rating_threshold",
    ];
}

pub struct AppState {
    pub store: Arc<TutorStore>,
    pub resolver: Arc<Resolver>,
    pub feedback: Arc<FeedbackService>,
    pub admin_ids: HashSet<u64>,
    pub config: Arc<RwLock<TutorConfig>>,
}

impl AppState {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
