//! Answer cache and its write-behind writer.
//!
//! The resolver never waits on a cache write: finished answers are queued to
//! a [`CacheWriter`] task that applies them in order and logs failures.
//! [`CacheWriter::flush`] resolves once everything queued before it has been
//! applied.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::resolve::types::{Answer, Fingerprint};

#[async_trait]
pub trait AnswerCache: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Answer>>;
    async fn put(&self, fingerprint: Fingerprint, answer: Answer) -> Result<()>;
}

/// In-memory cache with per-entry TTL and bounded capacity.
pub struct MemoryCache {
    entries: Cache<Fingerprint, Answer>,
}

impl MemoryCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }
}

#[async_trait]
impl AnswerCache for MemoryCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Answer>> {
        Ok(self.entries.get(fingerprint).await)
    }

    async fn put(&self, fingerprint: Fingerprint, answer: Answer) -> Result<()> {
        self.entries.insert(fingerprint, answer).await;
        Ok(())
    }
}

enum WriteOp {
    Put(Fingerprint, Answer),
    Flush(oneshot::Sender<()>),
}

pub struct CacheWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl CacheWriter {
    /// Spawn the writer task. It lives until every `CacheWriter` handle is dropped.
    pub fn spawn(cache: Arc<dyn AnswerCache>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Put(fingerprint, answer) => {
                        let source = answer.source;
                        match cache.put(fingerprint.clone(), answer).await {
                            Ok(()) => debug!(%fingerprint, %source, "answer cached"),
                            Err(e) => warn!(%fingerprint, error = %e, "cache write failed"),
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("cache writer shutting down");
        });

        Self { tx }
    }

    pub fn enqueue(&self, fingerprint: Fingerprint, answer: Answer) {
        if self.tx.send(WriteOp::Put(fingerprint, answer)).is_err() {
            warn!("cache writer stopped, dropping write");
        }
    }

    /// Wait until every write queued so far has been applied or logged.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::types::Source;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        let fp = Fingerprint::of("what is 2+2");
        assert!(cache.get(&fp).await.unwrap().is_none());

        let answer = Answer::hit(Source::Formula, "4", 0.99);
        cache.put(fp.clone(), answer.clone()).await.unwrap();
        assert_eq!(cache.get(&fp).await.unwrap(), Some(answer));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new(100, Duration::from_millis(50));
        let fp = Fingerprint::of("area of circle");
        cache
            .put(fp.clone(), Answer::hit(Source::Formula, "A = πr²", 0.9))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writer_applies_in_order_before_flush_returns() {
        let cache = Arc::new(MemoryCache::new(100, Duration::from_secs(60)));
        let writer = CacheWriter::spawn(cache.clone());
        let fp = Fingerprint::of("mean of 1 2 3");

        writer.enqueue(fp.clone(), Answer::hit(Source::Web, "first", 0.7));
        writer.enqueue(fp.clone(), Answer::hit(Source::Generative, "second", 0.55));
        writer.flush().await;

        let stored = cache.get(&fp).await.unwrap().unwrap();
        assert_eq!(stored.content, "second");
    }
}
