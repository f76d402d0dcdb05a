use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text;

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Patched,
    Cached,
    Formula,
    Document,
    CuratedBank,
    VectorDataset,
    Web,
    Generative,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Patched => "patched",
            Source::Cached => "cached",
            Source::Formula => "formula",
            Source::Document => "document",
            Source::CuratedBank => "curated_bank",
            Source::VectorDataset => "vector_dataset",
            Source::Web => "web",
            Source::Generative => "generative",
        }
    }

    /// Human-readable label for chat output.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Patched => "Human-improved solution",
            Source::Cached => "Cache",
            Source::Formula => "Direct calculation",
            Source::Document => "Uploaded document",
            Source::CuratedBank => "Curated problem bank",
            Source::VectorDataset => "Problem dataset",
            Source::Web => "Web search",
            Source::Generative => "AI generated",
        }
    }

    /// Tie-break rank: lower wins when confidences are equal.
    pub fn priority(&self) -> u8 {
        match self {
            Source::Patched => 0,
            Source::Cached => 1,
            Source::Formula => 2,
            Source::Document => 3,
            Source::CuratedBank => 4,
            Source::VectorDataset => 5,
            Source::Web => 6,
            Source::Generative => 7,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key for cache and patch lookups: blake3 hex of the normalized question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        Self(blake3::hash(text::normalize(text).as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for log lines.
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// An incoming question. Immutable once built.
#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    context: Option<String>,
    fingerprint: Fingerprint,
}

impl Query {
    /// `context` is an opaque blob: a selected document id for document
    /// lookups, extra guidance for generation.
    pub fn new(text: &str, context: Option<&str>) -> Self {
        Self {
            text: text.trim().to_string(),
            context: context
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            fingerprint: Fingerprint::of(text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn normalized(&self) -> String {
        text::normalize(&self.text)
    }
}

/// The outcome of one source attempt.
///
/// A miss carries no content and its confidence is zero; only hits take part
/// in ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub found: bool,
    pub content: String,
    pub source: Source,
    pub confidence: f64,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Answer {
    pub fn hit(source: Source, content: impl Into<String>, confidence: f64) -> Self {
        Self {
            found: true,
            content: content.into(),
            source,
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            references: Vec::new(),
            error: None,
        }
    }

    pub fn miss(source: Source) -> Self {
        Self {
            found: false,
            content: String::new(),
            source,
            confidence: 0.0,
            references: Vec::new(),
            error: None,
        }
    }

    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_hit(&self) -> bool {
        self.found && !self.content.trim().is_empty()
    }
}
