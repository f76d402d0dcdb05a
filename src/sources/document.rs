use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{AdapterError, SourceAdapter};
use crate::resolve::types::{Answer, Query, Source};
use crate::store::types::DocExcerpt;
use crate::store::TutorStore;
use crate::text;

const MAX_KEYWORDS: usize = 8;
const MAX_EXCERPTS: usize = 3;
const MAX_DOCUMENTS: usize = 200;

/// Keyword search over uploaded study material.
pub struct DocumentAdapter {
    store: Arc<TutorStore>,
}

impl DocumentAdapter {
    pub fn new(store: Arc<TutorStore>) -> Self {
        Self { store }
    }

    /// The selected document when the context names one, otherwise all of them.
    async fn scope(&self, query: &Query) -> Result<Vec<(String, String)>, AdapterError> {
        if let Some(id) = query.context() {
            if let Ok(meta) = self.store.get_meta(id).await {
                return Ok(vec![(meta.id, meta.title)]);
            }
        }
        Ok(self
            .store
            .list_documents(MAX_DOCUMENTS)
            .await?
            .into_iter()
            .map(|m| (m.id, m.title))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for DocumentAdapter {
    fn source(&self) -> Source {
        Source::Document
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        let keywords = text::keywords(query.text(), MAX_KEYWORDS);
        if keywords.is_empty() {
            return Ok(Answer::miss(Source::Document));
        }

        let mut found: Vec<(DocExcerpt, String)> = Vec::new();
        for (id, title) in self.scope(query).await? {
            let excerpts = self.store.search(&id, &keywords, MAX_EXCERPTS).await?;
            found.extend(excerpts.into_iter().map(|e| (e, title.clone())));
        }
        found.sort_by(|a, b| b.0.match_count.cmp(&a.0.match_count));
        found.truncate(MAX_EXCERPTS);

        let Some((best, _)) = found.first() else {
            return Ok(Answer::miss(Source::Document));
        };
        let coverage = best.match_count as f64 / keywords.len() as f64;
        debug!(excerpts = found.len(), coverage, "document matches");

        let content = found
            .iter()
            .map(|(excerpt, title)| format!("From **{}**:\n> {}", title, collapse(&excerpt.content)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut references: Vec<String> = Vec::new();
        for (_, title) in &found {
            if !references.contains(title) {
                references.push(title.clone());
            }
        }

        Ok(Answer::hit(Source::Document, content, 0.5 + 0.45 * coverage).with_references(references))
    }
}

fn collapse(excerpt: &str) -> String {
    format!("...{}...", excerpt.split_whitespace().collect::<Vec<_>>().join(" "))
}
