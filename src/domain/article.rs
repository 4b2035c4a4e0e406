//! Article paragraphs extracted from the host document.
//!
//! Paragraph records are created once per page session and never mutated;
//! every analysis refers to paragraphs by their dense index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::page::{Document, NodeId};

/// Paragraphs with this many characters or fewer are ignored
pub const MIN_PARAGRAPH_CHARS: usize = 20;

/// Page identifier (SHA256(url)[0:16])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(String);

impl PageId {
    /// Create a page ID from a URL
    pub fn from_url(url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();

        // Take first 8 bytes (16 hex chars)
        Self(hex::encode(&result[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single article paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Dense index in document order
    pub index: usize,
    /// Trimmed inner text (always longer than 20 characters)
    pub text: String,
    /// Handle of the paragraph node in the host document
    pub node: NodeId,
}

/// Read every paragraph of the document, keeping the substantial ones
pub fn extract_paragraphs(document: &dyn Document) -> Vec<Paragraph> {
    document
        .paragraph_nodes()
        .into_iter()
        .filter_map(|(node, text)| {
            let text = text.trim();
            (text.chars().count() > MIN_PARAGRAPH_CHARS).then(|| (node, text.to_string()))
        })
        .enumerate()
        .map(|(index, (node, text))| Paragraph { index, text, node })
        .collect()
}

/// The article on the current page
#[derive(Debug, Clone)]
pub struct Article {
    pub page: PageId,
    pub url: String,
    pub host: String,
    pub paragraphs: Arc<[Paragraph]>,
}

impl Article {
    /// Extract the article from a document loaded from `url`
    pub fn extract(document: &dyn Document, url: &str) -> Self {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();

        Self {
            page: PageId::from_url(url),
            url: url.to_string(),
            host,
            paragraphs: extract_paragraphs(document).into(),
        }
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
        self.paragraphs.get(index)
    }

    /// Paragraph texts joined by single spaces, cut to `max_chars` characters
    pub fn plain_text(&self, max_chars: usize) -> String {
        let joined = self
            .paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        truncate_chars(&joined, max_chars)
    }

    /// Paragraphs labelled `[i] text`, separated by blank lines, cut to
    /// `max_chars` characters
    pub fn labelled_text(&self, max_chars: usize) -> String {
        let joined = self
            .paragraphs
            .iter()
            .map(|p| format!("[{}] {}", p.index, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        truncate_chars(&joined, max_chars)
    }
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
