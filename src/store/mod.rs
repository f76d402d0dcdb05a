pub mod ingest;
pub mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cnidarium::{StateDelta, StateRead, StateWrite, Storage};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::feedback::{FeedbackLog, PatchStore};
use crate::resolve::types::Fingerprint;
use types::{DocExcerpt, DocId, DocMeta, FeedbackPatch, FeedbackRecord};

// Key prefixes (no trailing slashes, cnidarium convention)
const CONTENT_PREFIX: &str = "doc/content";
const META_PREFIX: &str = "doc/meta";
const FEEDBACK_PREFIX: &str = "feedback";
const PATCH_PREFIX: &str = "patch";

/// Characters of context kept on each side of a keyword hit.
const CONTEXT_WINDOW: usize = 300;

fn content_key(id: &str) -> String {
    format!("{}/{}", CONTENT_PREFIX, id)
}
fn meta_key(id: &str) -> String {
    format!("{}/{}", META_PREFIX, id)
}
fn feedback_key(record: &FeedbackRecord) -> String {
    format!("{}/{:016}:{}", FEEDBACK_PREFIX, record.timestamp, record.id)
}
fn patch_key(fingerprint: &Fingerprint) -> String {
    format!("{}/{}", PATCH_PREFIX, fingerprint.as_str())
}

/// Persistent state: uploaded documents, feedback records and patches.
pub struct TutorStore {
    storage: Storage,
    /// Document content is immutable once stored, so reads are memoized.
    content_cache: RwLock<HashMap<DocId, String>>,
    /// Commits fork from the latest snapshot; one writer at a time.
    write_lock: Mutex<()>,
}

impl TutorStore {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let prefixes = vec![
            CONTENT_PREFIX.to_string(),
            META_PREFIX.to_string(),
            FEEDBACK_PREFIX.to_string(),
            PATCH_PREFIX.to_string(),
        ];
        let storage = Storage::load(data_dir.to_path_buf(), prefixes)
            .await
            .context("Failed to init cnidarium storage")?;
        Ok(Self {
            storage,
            content_cache: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        })
    }

    async fn commit_puts(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        for (key, value) in entries {
            delta.put_raw(key, value);
        }
        self.storage.commit(delta).await?;
        Ok(())
    }

    async fn scan<T: serde::de::DeserializeOwned>(&self, prefix: &str) -> Vec<T> {
        let snapshot = self.storage.latest_snapshot();
        let mut stream = snapshot.prefix_raw(prefix);
        let mut out = Vec::new();
        while let Some(entry) = stream.next().await {
            match entry {
                Ok((key, value)) => match serde_json::from_slice::<T>(&value) {
                    Ok(item) => out.push(item),
                    Err(e) => warn!(%key, error = %e, "skipping unreadable entry"),
                },
                Err(e) => warn!(prefix, error = %e, "error reading prefix stream"),
            }
        }
        out
    }

    /// Store a document. Idempotent: same content, same id.
    pub async fn store_document(&self, text: &str, title: &str, origin: &str) -> Result<DocId> {
        let id = blake3::hash(text.as_bytes()).to_hex().to_string();
        let meta = DocMeta {
            id: id.clone(),
            title: title.to_string(),
            origin: origin.to_string(),
            size: text.len(),
            ingested_at: chrono::Utc::now().timestamp(),
        };
        self.commit_puts(vec![
            (content_key(&id), text.as_bytes().to_vec()),
            (meta_key(&id), serde_json::to_vec(&meta).context("serialize meta")?),
        ])
        .await?;
        debug!(doc_id = %id, title, size = text.len(), "document stored");
        Ok(id)
    }

    pub async fn get_content(&self, doc_id: &str) -> Result<String> {
        if let Some(content) = self.content_cache.read().await.get(doc_id) {
            return Ok(content.clone());
        }

        let bytes = self
            .storage
            .latest_snapshot()
            .get_raw(&content_key(doc_id))
            .await?
            .ok_or_else(|| anyhow::anyhow!("document not found: {}", doc_id))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        self.content_cache
            .write()
            .await
            .insert(doc_id.to_string(), content.clone());
        Ok(content)
    }

    pub async fn get_meta(&self, doc_id: &str) -> Result<DocMeta> {
        let bytes = self
            .storage
            .latest_snapshot()
            .get_raw(&meta_key(doc_id))
            .await?
            .ok_or_else(|| anyhow::anyhow!("document metadata not found: {}", doc_id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All documents, newest first.
    pub async fn list_documents(&self, limit: usize) -> Result<Vec<DocMeta>> {
        let mut docs: Vec<DocMeta> = self.scan(META_PREFIX).await;
        docs.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));
        docs.truncate(limit);
        Ok(docs)
    }

    /// Keyword search within one document.
    pub async fn search(&self, doc_id: &str, keywords: &[String], max_results: usize) -> Result<Vec<DocExcerpt>> {
        let content = self.get_content(doc_id).await?;
        Ok(search_text(doc_id, &content, keywords, max_results))
    }
}

/// Excerpts of `text` around keyword hits, best-covered windows first.
///
/// Hits closer than the context window to an earlier hit are folded into it.
pub fn search_text(doc_id: &str, text: &str, keywords: &[String], max_results: usize) -> Vec<DocExcerpt> {
    if keywords.is_empty() || text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = chars.iter().map(|c| c.to_lowercase().next().unwrap_or(*c)).collect();
    let lower_text: String = lower.iter().collect();

    let mut seen: Vec<usize> = Vec::new();
    let mut results = Vec::new();

    for keyword in keywords {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let mut from_byte = 0;
        while let Some(pos) = lower_text[from_byte..].find(&needle) {
            let byte_pos = from_byte + pos;
            let char_pos = lower_text[..byte_pos].chars().count();
            from_byte = byte_pos + needle.len().max(1);

            if seen.iter().any(|&o| char_pos.abs_diff(o) < CONTEXT_WINDOW) {
                continue;
            }
            seen.push(char_pos);

            let start = char_pos.saturating_sub(CONTEXT_WINDOW);
            let end = (char_pos + needle.chars().count() + CONTEXT_WINDOW).min(chars.len());
            let window: String = lower[start..end].iter().collect();
            let match_count = keywords
                .iter()
                .filter(|k| window.contains(&k.to_lowercase()))
                .count();

            results.push(DocExcerpt {
                doc_id: doc_id.to_string(),
                offset: char_pos,
                content: chars[start..end].iter().collect(),
                match_count,
            });
        }
    }

    results.sort_by(|a, b| b.match_count.cmp(&a.match_count).then(a.offset.cmp(&b.offset)));
    results.truncate(max_results);
    results
}

#[async_trait]
impl PatchStore for TutorStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<FeedbackPatch>> {
        let bytes = self
            .storage
            .latest_snapshot()
            .get_raw(&patch_key(fingerprint))
            .await?;
        bytes
            .map(|b| serde_json::from_slice(&b).context("deserialize patch"))
            .transpose()
    }

    async fn put(&self, fingerprint: Fingerprint, patch: FeedbackPatch) -> Result<()> {
        let value = serde_json::to_vec(&patch).context("serialize patch")?;
        self.commit_puts(vec![(patch_key(&fingerprint), value)]).await?;
        debug!(%fingerprint, "patch stored");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let snapshot = self.storage.latest_snapshot();
        let mut stream = snapshot.prefix_raw(PATCH_PREFIX);
        let mut count = 0;
        while let Some(entry) = stream.next().await {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl FeedbackLog for TutorStore {
    async fn record(&self, record: &FeedbackRecord) -> Result<()> {
        let value = serde_json::to_vec(record).context("serialize FeedbackRecord")?;
        self.commit_puts(vec![(feedback_key(record), value)]).await?;
        debug!(feedback_id = %record.id, rating = record.rating, "feedback stored");
        Ok(())
    }

    async fn records(&self) -> Result<Vec<FeedbackRecord>> {
        Ok(self.scan(FEEDBACK_PREFIX).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::types::{Answer, Source};

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_search_text_ranks_by_coverage() {
        let filler = " lorem".repeat(200);
        let text = format!(
            "The derivative measures change.{}The chain rule: the derivative of f(g(x)) is f'(g(x)) g'(x).",
            filler
        );
        let hits = search_text("d", &text, &words(&["chain", "derivative"]), 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].match_count, 2);
        assert!(hits[0].content.contains("chain rule"));
        assert_eq!(hits[1].match_count, 1);
    }

    #[test]
    fn test_search_text_folds_nearby_hits_and_is_case_insensitive() {
        let text = "Pythagoras: a² + b² = c². PYTHAGORAS again right here.";
        let hits = search_text("d", text, &words(&["pythagoras"]), 5);
        assert_eq!(hits.len(), 1);
        assert!(search_text("d", text, &[], 5).is_empty());
    }

    #[tokio::test]
    async fn test_documents_roundtrip_and_idempotent_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = TutorStore::new(dir.path()).await.unwrap();

        let id = store
            .store_document("Integration by parts: ∫u dv = uv - ∫v du", "Calc notes", "text")
            .await
            .unwrap();
        let again = store
            .store_document("Integration by parts: ∫u dv = uv - ∫v du", "Calc notes", "text")
            .await
            .unwrap();
        assert_eq!(id, again);

        let docs = store.list_documents(10).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Calc notes");

        let hits = store.search(&id, &words(&["parts"]), 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.get_content("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_patches_and_feedback_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = TutorStore::new(dir.path()).await.unwrap();
        let fp = Fingerprint::of("what is 0.1 + 0.2");

        assert!(PatchStore::get(&store, &fp).await.unwrap().is_none());
        let patch = FeedbackPatch::new(Answer::hit(Source::Patched, "0.3", 0.98), 1);
        store.put(fp.clone(), patch.clone()).await.unwrap();
        store.put(fp.clone(), patch).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let stored = PatchStore::get(&store, &fp).await.unwrap().unwrap();
        assert_eq!(stored.answer.content, "0.3");

        let record = FeedbackRecord {
            id: "abc".to_string(),
            fingerprint: fp.as_str().to_string(),
            question: "what is 0.1 + 0.2".to_string(),
            original_answer: None,
            rating: 1,
            comment: Some("rounding".to_string()),
            correction: None,
            user_id: 7,
            improved: true,
            timestamp: 1_700_000_000,
        };
        store.record(&record).await.unwrap();
        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].comment.as_deref(), Some("rounding"));
    }
}
