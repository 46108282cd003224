//! Document store collaborator.
//!
//! The engine expects a text-pattern search primitive over structured
//! records: a disjunction of per-keyword field-match conditions across the
//! common fields and every kind-specific nested collection, filterable by
//! the published flag. No pre-ranking is expected from the store — scoring
//! happens entirely in this crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Document;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreQuery {
    /// A document matches when any of these terms occurs in any field.
    pub terms: Vec<String>,
    /// Priority terms (detected model names and years): when non-empty, a
    /// matching document must also contain at least one of them. Scoring
    /// applies the exact year/model rules afterwards; this only narrows the
    /// candidate set.
    pub required_terms: Vec<String>,
    pub published_only: bool,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn search(&self, query: &StoreQuery) -> Result<Vec<Document>>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory store over a document snapshot. Used by the test suite and by
/// hosts that load their corpus up front.
pub struct MemoryDocumentStore {
    documents: Vec<Document>,
}

impl MemoryDocumentStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    fn matches_term(document: &Document, term: &str) -> bool {
        let term = term.to_lowercase();
        let contains = |field: &str| field.to_lowercase().contains(&term);

        contains(&document.title)
            || contains(&document.category)
            || document.summary.as_deref().map_or(false, contains)
            || document.description.as_deref().map_or(false, contains)
            || document.content.as_deref().map_or(false, contains)
            || document
                .sections
                .iter()
                .any(|s| contains(&s.heading) || contains(&s.content))
            || document
                .videos
                .iter()
                .any(|v| contains(&v.title) || contains(&v.description))
            || document
                .faqs
                .iter()
                .any(|f| contains(&f.title) || contains(&f.description))
            || document
                .compatible_models
                .iter()
                .any(|m| contains(&m.name) || m.description.as_deref().map_or(false, contains))
            || document
                .incompatible_models
                .iter()
                .any(|m| contains(&m.name) || m.reason.as_deref().map_or(false, contains))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn search(&self, query: &StoreQuery) -> Result<Vec<Document>> {
        let results: Vec<Document> = self
            .documents
            .iter()
            .filter(|doc| !query.published_only || doc.published)
            .filter(|doc| {
                query.terms.is_empty()
                    || query.terms.iter().any(|t| Self::matches_term(doc, t))
            })
            .filter(|doc| {
                query.required_terms.is_empty()
                    || query
                        .required_terms
                        .iter()
                        .any(|t| Self::matches_term(doc, t))
            })
            .cloned()
            .collect();
        Ok(results)
    }
}
