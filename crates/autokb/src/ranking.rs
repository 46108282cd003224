//! Ranking and adaptive truncation.
//!
//! Two-stage filtering: an absolute relevance floor keeps weak corpora from
//! surfacing noise, then a relative threshold against the top score keeps
//! strong corpora from flooding the user, with a minimum-count safety net.

use crate::config::ScoringConfig;
use crate::intent::QueryIntent;
use crate::types::{DocumentKind, ScoredCandidate};

/// The document kind favored when two candidates score within the tie margin.
fn preferred_kind(intent: &QueryIntent) -> Option<DocumentKind> {
    if intent.is_compatibility {
        Some(DocumentKind::Structured)
    } else if intent.is_installation {
        Some(DocumentKind::Video)
    } else {
        None
    }
}

pub fn rank_and_truncate(
    mut candidates: Vec<ScoredCandidate>,
    intent: &QueryIntent,
    config: &ScoringConfig,
) -> Vec<ScoredCandidate> {
    candidates.retain(|c| c.score >= 0);
    candidates.retain(|c| c.score >= config.relevance_floor);
    if candidates.is_empty() {
        return candidates;
    }

    // Stable descending sort keeps retrieval order among exact ties, so the
    // overall ordering is reproducible.
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    // Near-ties break by type preference. A bounded swap pass instead of a
    // banded comparator: closeness is not transitive, so it cannot feed
    // `sort_by` directly. Each swap strictly reduces the number of
    // preference inversions, so the loop terminates.
    if let Some(kind) = preferred_kind(intent) {
        let rank = |candidate: &ScoredCandidate| usize::from(candidate.document.kind != kind);
        loop {
            let mut swapped = false;
            for i in 0..candidates.len().saturating_sub(1) {
                let close = candidates[i].score - candidates[i + 1].score < config.tie_margin;
                if close && rank(&candidates[i + 1]) < rank(&candidates[i]) {
                    candidates.swap(i, i + 1);
                    swapped = true;
                }
            }
            if !swapped {
                break;
            }
        }
    }

    // Adaptive truncation against the top score.
    let pre_threshold = candidates.len();
    let top_score = candidates.iter().map(|c| c.score).max().unwrap_or(0);
    let threshold = top_score as f32 * config.truncation_ratio;
    let kept: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| c.score as f32 >= threshold)
        .cloned()
        .collect();

    if kept.len() < config.min_results && pre_threshold >= config.min_results {
        candidates.truncate(config.min_results);
        tracing::debug!(
            kept = candidates.len(),
            pre_threshold,
            "threshold too aggressive, keeping minimum result count"
        );
        candidates
    } else {
        kept
    }
}
