//! Answer sources.
//!
//! Every source implements [`SourceAdapter`]. "Nothing usable" is an
//! `Ok(Answer::miss(..))`; `Err` is reserved for infrastructure trouble
//! (network down, quota, a broken backend). The resolver treats errors as
//! misses everywhere except the generative fallback.

pub mod bank;
pub mod document;
pub mod formula;
pub mod generative;
pub mod vector;
pub mod web;

use async_trait::async_trait;

use crate::resolve::types::{Answer, Query, Source};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Network, timeout or quota trouble; worth trying again later.
    #[error("transient {adapter} failure: {reason}")]
    Transient { adapter: Source, reason: String },

    /// The backend is not configured or refuses service.
    #[error("{adapter} unavailable: {reason}")]
    Unavailable { adapter: Source, reason: String },

    #[error("{adapter} attempt panicked: {message}")]
    Panicked { adapter: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdapterError {
    pub fn transient(adapter: Source, reason: impl Into<String>) -> Self {
        Self::Transient {
            adapter,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter answers for. Also the adapter's identity
    /// inside a phase, so two adapters in one phase must not share it.
    fn source(&self) -> Source;

    /// Try to answer `query`. Must be safe to drop mid-flight.
    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError>;
}
