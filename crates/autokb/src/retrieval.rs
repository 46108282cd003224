//! Candidate retrieval.
//!
//! Turns the keyword set into a store query. Detected years and model-name
//! candidates become priority terms so the store narrows the candidate set
//! before scoring; the exact year/model rules are still enforced by the
//! scorer. Store failures and timeouts degrade to an empty candidate list —
//! the engine then answers in general-knowledge mode rather than failing the
//! request.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::keywords::{model_candidates, year_keywords};
use crate::store::{DocumentStore, StoreQuery};
use crate::types::Document;

pub fn build_store_query(keywords: &[String]) -> StoreQuery {
    let mut required_terms = year_keywords(keywords);
    required_terms.extend(model_candidates(keywords));
    StoreQuery {
        terms: keywords.to_vec(),
        required_terms,
        published_only: true,
    }
}

pub async fn retrieve(
    store: &Arc<dyn DocumentStore>,
    keywords: &[String],
    timeout_secs: u64,
) -> Vec<Document> {
    let query = build_store_query(keywords);
    match timeout(Duration::from_secs(timeout_secs), store.search(&query)).await {
        Ok(Ok(documents)) => {
            tracing::debug!(candidates = documents.len(), "retrieved candidate documents");
            documents
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "document store search failed, continuing with no candidates");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs,
                "document store search timed out, continuing with no candidates"
            );
            Vec::new()
        }
    }
}
