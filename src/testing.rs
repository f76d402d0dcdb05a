//! In-memory fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::feedback::{FeedbackLog, PatchStore};
use crate::resolve::types::{Answer, Fingerprint, Query, Source};
use crate::sources::{AdapterError, SourceAdapter};
use crate::store::types::{FeedbackPatch, FeedbackRecord};

#[derive(Debug, Clone)]
pub enum Behavior {
    Hit(String, f64),
    Miss,
    Fail,
    Panic,
    /// Never completes.
    Hang,
}

pub struct FakeAdapter {
    source: Source,
    behavior: Behavior,
    calls: AtomicUsize,
    last_context: Mutex<Option<String>>,
}

impl FakeAdapter {
    pub fn new(source: Source, behavior: Behavior) -> Self {
        Self {
            source,
            behavior,
            calls: AtomicUsize::new(0),
            last_context: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<String> {
        self.last_context.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock().unwrap() = query.context().map(str::to_string);
        match &self.behavior {
            Behavior::Hit(content, confidence) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Answer::hit(self.source, content.clone(), *confidence))
            }
            Behavior::Miss => Ok(Answer::miss(self.source)),
            Behavior::Fail => Err(AdapterError::transient(self.source, "backend unreachable")),
            Behavior::Panic => panic!("{} adapter panicked", self.source),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Answer::miss(self.source))
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryPatches {
    entries: tokio::sync::Mutex<HashMap<Fingerprint, FeedbackPatch>>,
}

#[async_trait]
impl PatchStore for MemoryPatches {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<FeedbackPatch>> {
        Ok(self.entries.lock().await.get(fingerprint).cloned())
    }

    async fn put(&self, fingerprint: Fingerprint, patch: FeedbackPatch) -> Result<()> {
        self.entries.lock().await.insert(fingerprint, patch);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }
}

#[derive(Default)]
pub struct MemoryFeedbackLog {
    records: tokio::sync::Mutex<Vec<FeedbackRecord>>,
}

#[async_trait]
impl FeedbackLog for MemoryFeedbackLog {
    async fn record(&self, record: &FeedbackRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn records(&self) -> Result<Vec<FeedbackRecord>> {
        Ok(self.records.lock().await.clone())
    }
}
