//! Relevance scoring — the core ranking function.
//!
//! `score_document` consumes one candidate document, the original query, the
//! intent classification and the keyword set, and returns a signed score.
//! It is a pipeline of pure passes, each contributing a delta folded into an
//! accumulator; hard filters short-circuit the fold with a large negative
//! sentinel instead of merely lowering the rank. The scorer is intentionally
//! over-determined — many independent additive signals — so no single
//! heuristic dominates.

use crate::intent::{ProblemType, QueryIntent};
use crate::keywords::{brand_keywords, model_candidates, year_keywords};
use crate::types::{Document, DocumentKind, Query};

/// Categorical disqualification: an exact year/model mismatch excludes the
/// document regardless of textual similarity elsewhere.
pub const HARD_EXCLUDE: i32 = -1000;
/// Installation videos with no problem-keyword overlap are excluded from
/// troubleshooting queries.
pub const TROUBLESHOOT_MISMATCH: i32 = -100;

/// Pass bonuses. The exclusion sentinels above, the relevance floor and the
/// truncation ratio are fixed by the system contract; these relative weights
/// keep exact-phrase > model-match > compatibility-boost > phrase/density >
/// per-keyword signals.
mod weights {
    pub const COMPAT_BOOST: i32 = 50;
    pub const COMPAT_INSTALL_VIDEO_PENALTY: i32 = -20;
    pub const INSTALL_TROUBLE_CATEGORY_PENALTY: i32 = -10;
    pub const EXACT_PHRASE: i32 = 80;
    pub const YEAR_MATCH: i32 = 15;
    pub const MODEL_TITLE_MATCH: i32 = 60;
    pub const BRAND_MATCH: i32 = 10;
    pub const TECH_PHRASE: i32 = 25;
    pub const TITLE_KEYWORD: i32 = 8;
    pub const SUMMARY_KEYWORD: i32 = 4;
    pub const TITLE_CLUSTER: i32 = 20;
    pub const LINEAR_FIELD_HIT: i32 = 3;
    pub const ALIGN_STRUCTURED_COMPAT: i32 = 30;
    pub const ALIGN_TROUBLESHOOTING: i32 = 25;
    pub const ALIGN_VIDEO_INSTALL: i32 = 25;
    pub const MISALIGN_VIDEO_TROUBLE: i32 = -15;
    pub const NESTED_HIT: i32 = 2;
    pub const FAQ_PRESENT: i32 = 10;
    pub const COMPAT_MODEL_MATCH: i32 = 50;
}

/// Domain phrases that earn extra weight when both the query side and the
/// document carry them.
const TECHNICAL_PHRASES: &[&str] = &[
    "steering wheel control",
    "backup camera",
    "blank screen",
    "no sound",
    "factory radio",
    "installation video",
    "compatibility",
];

enum Verdict {
    Delta(i32),
    Exclude(i32),
}

/// Lowercased snapshot of the document's searchable fields, computed once
/// per scoring call.
struct DocText {
    title: String,
    summary: String,
    category: String,
    /// title + summary + content, the year hard filter's search space.
    full: String,
}

impl DocText {
    fn new(document: &Document) -> Self {
        let title = document.title.to_lowercase();
        let summary = document
            .summary
            .as_deref()
            .unwrap_or("")
            .to_lowercase();
        let content = document.content.as_deref().unwrap_or("").to_lowercase();
        let full = format!("{}\n{}\n{}", title, summary, content);
        Self {
            title,
            summary,
            category: document.category.to_lowercase(),
            full,
        }
    }
}

pub fn score_document(
    document: &Document,
    query: &Query,
    intent: &QueryIntent,
    keywords: &[String],
) -> i32 {
    let text = DocText::new(document);
    let query_lower = query.text.to_lowercase();
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut score = 0;
    macro_rules! pass {
        ($name:expr, $verdict:expr) => {
            match $verdict {
                Verdict::Delta(delta) => {
                    if delta != 0 {
                        tracing::debug!(title = %document.title, pass = $name, delta, "scoring pass");
                    }
                    score += delta;
                }
                Verdict::Exclude(sentinel) => {
                    tracing::debug!(title = %document.title, pass = $name, sentinel, "hard exclusion");
                    return sentinel;
                }
            }
        };
    }

    pass!("compatibility_boost", compatibility_boost(document, &text, intent));
    pass!("negative_filtering", negative_filtering(document, &text, intent));
    pass!("exact_phrase", exact_phrase(&text, &query_lower));
    pass!("year_filter", year_filter(&text, keywords));
    pass!("model_filter", model_filter(&text, keywords));
    pass!(
        "technical_phrase",
        Verdict::Delta(technical_phrase(&text, &query_lower, &keywords_lower))
    );
    pass!("keyword_density", Verdict::Delta(keyword_density(&text, &keywords_lower)));
    pass!(
        "per_keyword_linear",
        Verdict::Delta(per_keyword_linear(&text, &keywords_lower))
    );
    pass!("alignment", Verdict::Delta(alignment(document, &text, intent)));
    pass!(
        "content_depth",
        Verdict::Delta(content_depth(document, &keywords_lower, intent))
    );
    pass!(
        "compatible_model_match",
        Verdict::Delta(compatible_model_match(document, keywords))
    );

    tracing::debug!(title = %document.title, score, "scored candidate");
    score
}

/// A title that reads as an installation video: install vocabulary on a
/// video document (or an explicit "video" in the title).
fn is_installation_video_title(document: &Document, text: &DocText) -> bool {
    let installish = text.title.contains("install") || text.title.contains("安装");
    installish && (document.kind == DocumentKind::Video || text.title.contains("video"))
}

fn problem_overlap_terms(problem_type: Option<ProblemType>) -> &'static [&'static str] {
    match problem_type {
        Some(ProblemType::Bluetooth) => &["bluetooth", "pairing", "蓝牙"],
        Some(ProblemType::Audio) => &["sound", "audio", "volume", "speaker"],
        Some(ProblemType::Display) => &["screen", "display", "blank"],
        Some(ProblemType::Compatibility) => &["compatible", "compatibility"],
        None => &["troubleshoot", "fix", "problem", "issue", "not working"],
    }
}

// Pass 1: compatibility questions favor structured docs and docs that carry a
// compatible-models list; a plain installation video is the wrong answer to
// "will it work".
fn compatibility_boost(document: &Document, text: &DocText, intent: &QueryIntent) -> Verdict {
    if !intent.is_compatibility {
        return Verdict::Delta(0);
    }
    let mut delta = 0;
    if document.kind == DocumentKind::Structured || !document.compatible_models.is_empty() {
        delta += weights::COMPAT_BOOST;
    }
    if is_installation_video_title(document, text) && !text.title.contains("compat") {
        delta += weights::COMPAT_INSTALL_VIDEO_PENALTY;
    }
    Verdict::Delta(delta)
}

// Pass 2: troubleshooting queries exclude installation videos that never
// mention the reported problem; installation queries slightly demote docs
// filed under troubleshooting.
fn negative_filtering(document: &Document, text: &DocText, intent: &QueryIntent) -> Verdict {
    if intent.is_troubleshooting && is_installation_video_title(document, text) {
        let overlap = problem_overlap_terms(intent.problem_type)
            .iter()
            .any(|term| text.full.contains(term));
        if !overlap {
            return Verdict::Exclude(TROUBLESHOOT_MISMATCH);
        }
    }
    if intent.is_installation && text.category.contains("troubleshoot") {
        return Verdict::Delta(weights::INSTALL_TROUBLE_CATEGORY_PENALTY);
    }
    Verdict::Delta(0)
}

// Pass 3: the whole question appearing verbatim in title or summary is the
// strongest single textual signal.
fn exact_phrase(text: &DocText, query_lower: &str) -> Verdict {
    let phrase = query_lower.trim();
    if phrase.chars().count() >= 10
        && (text.title.contains(phrase) || text.summary.contains(phrase))
    {
        return Verdict::Delta(weights::EXACT_PHRASE);
    }
    Verdict::Delta(0)
}

// Pass 4: year hard filter. A query pinned to specific years must never
// surface documents for other years.
fn year_filter(text: &DocText, keywords: &[String]) -> Verdict {
    let years = year_keywords(keywords);
    if years.is_empty() {
        return Verdict::Delta(0);
    }
    let matched = years
        .iter()
        .filter(|year| text.full.contains(year.as_str()))
        .count() as i32;
    if matched == 0 {
        return Verdict::Exclude(HARD_EXCLUDE);
    }
    Verdict::Delta(matched * weights::YEAR_MATCH)
}

// Pass 5: model hard filter. Specific model tokens are categorical: the
// title must carry one. Brand names alone never force exclusion — a
// brand-only query should recall across the whole brand's corpus — so they
// contribute a small bonus instead.
fn model_filter(text: &DocText, keywords: &[String]) -> Verdict {
    let models = model_candidates(keywords);
    if !models.is_empty() {
        let matched = models
            .iter()
            .filter(|model| text.title.contains(&model.to_lowercase()))
            .count() as i32;
        if matched == 0 {
            return Verdict::Exclude(HARD_EXCLUDE);
        }
        return Verdict::Delta(matched * weights::MODEL_TITLE_MATCH);
    }

    let present = brand_keywords(keywords)
        .iter()
        .filter(|brand| {
            let brand = brand.to_lowercase();
            text.title.contains(&brand) || text.summary.contains(&brand)
        })
        .count() as i32;
    Verdict::Delta(present * weights::BRAND_MATCH)
}

// Pass 6: shared domain phrases. The query side counts both the raw text and
// the keyword set, so translated Chinese queries participate.
fn technical_phrase(text: &DocText, query_lower: &str, keywords_lower: &[String]) -> i32 {
    TECHNICAL_PHRASES
        .iter()
        .filter(|phrase| {
            let on_query_side = query_lower.contains(*phrase)
                || keywords_lower.iter().any(|k| k.contains(*phrase));
            on_query_side && text.full.contains(*phrase)
        })
        .count() as i32
        * weights::TECH_PHRASE
}

// Pass 7: keyword density, title weighted above summary, with a cluster
// bonus when three or more keywords co-occur in the title.
fn keyword_density(text: &DocText, keywords_lower: &[String]) -> i32 {
    let title_hits = keywords_lower
        .iter()
        .filter(|k| text.title.contains(k.as_str()))
        .count() as i32;
    let summary_hits = keywords_lower
        .iter()
        .filter(|k| text.summary.contains(k.as_str()))
        .count() as i32;
    let mut delta = title_hits * weights::TITLE_KEYWORD + summary_hits * weights::SUMMARY_KEYWORD;
    if title_hits >= 3 {
        delta += weights::TITLE_CLUSTER;
    }
    delta
}

// Pass 8: small uniform per-keyword bonus across title/summary/category.
fn per_keyword_linear(text: &DocText, keywords_lower: &[String]) -> i32 {
    keywords_lower
        .iter()
        .map(|k| {
            let mut hits = 0;
            if text.title.contains(k.as_str()) {
                hits += 1;
            }
            if text.summary.contains(k.as_str()) {
                hits += 1;
            }
            if text.category.contains(k.as_str()) {
                hits += 1;
            }
            hits * weights::LINEAR_FIELD_HIT
        })
        .sum()
}

// Pass 9: category/intent alignment.
fn alignment(document: &Document, text: &DocText, intent: &QueryIntent) -> i32 {
    let mut delta = 0;
    if intent.is_compatibility && document.kind == DocumentKind::Structured {
        delta += weights::ALIGN_STRUCTURED_COMPAT;
    }
    if intent.is_troubleshooting && text.category.contains("troubleshoot") {
        delta += weights::ALIGN_TROUBLESHOOTING;
    }
    if intent.is_installation && document.kind == DocumentKind::Video {
        delta += weights::ALIGN_VIDEO_INSTALL;
    }
    if intent.is_troubleshooting && is_installation_video_title(document, text) {
        delta += weights::MISALIGN_VIDEO_TROUBLE;
    }
    delta
}

// Pass 10: keyword hits inside the nested collections, plus a flat bonus for
// FAQ-bearing docs on compatibility/troubleshooting questions.
fn content_depth(document: &Document, keywords_lower: &[String], intent: &QueryIntent) -> i32 {
    let mut hits = 0;
    for keyword in keywords_lower {
        for section in &document.sections {
            if section.heading.to_lowercase().contains(keyword)
                || section.content.to_lowercase().contains(keyword)
            {
                hits += 1;
            }
        }
        for video in &document.videos {
            if video.title.to_lowercase().contains(keyword)
                || video.description.to_lowercase().contains(keyword)
            {
                hits += 1;
            }
        }
        for faq in &document.faqs {
            if faq.title.to_lowercase().contains(keyword)
                || faq.description.to_lowercase().contains(keyword)
            {
                hits += 1;
            }
        }
    }
    let mut delta = hits * weights::NESTED_HIT;
    if !document.faqs.is_empty() && (intent.is_compatibility || intent.is_troubleshooting) {
        delta += weights::FAQ_PRESENT;
    }
    delta
}

// Pass 11: an extracted model token appearing in the compatible-models list
// is direct evidence, worth as much as the compatibility boost itself.
fn compatible_model_match(document: &Document, keywords: &[String]) -> i32 {
    model_candidates(keywords)
        .iter()
        .filter(|model| {
            let model = model.to_lowercase();
            document.compatible_models.iter().any(|entry| {
                entry.name.to_lowercase().contains(&model)
                    || entry
                        .description
                        .as_deref()
                        .map_or(false, |d| d.to_lowercase().contains(&model))
            })
        })
        .count() as i32
        * weights::COMPAT_MODEL_MATCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentClassifier;
    use crate::keywords::rule_based_keywords;
    use crate::language::detect_language;
    use crate::types::{CompatibleModel, Faq};

    fn query(text: &str) -> Query {
        Query {
            text: text.to_string(),
            language: detect_language(text),
        }
    }

    fn score_for(document: &Document, question: &str) -> i32 {
        let q = query(question);
        let intent = IntentClassifier::new().classify(question);
        let keywords = rule_based_keywords(&q, 20);
        score_document(document, &q, &intent, &keywords)
    }

    #[test]
    fn scoring_is_deterministic() {
        let mut doc = Document::new(DocumentKind::Video, "Highlander 2012 Installation Video", "installation");
        doc.summary = Some("Covers 2008 2009 2010 2011 2012 2013 models".into());
        let first = score_for(&doc, "Highlander 2008-2013 installation video");
        let second = score_for(&doc, "Highlander 2008-2013 installation video");
        assert_eq!(first, second);
    }

    #[test]
    fn year_mismatch_hard_excludes() {
        let doc = Document::new(DocumentKind::General, "Highlander 2015 Overview", "general");
        let score = score_for(&doc, "Highlander 2012 radio upgrade");
        assert_eq!(score, HARD_EXCLUDE);
    }

    #[test]
    fn year_match_survives() {
        let mut doc = Document::new(DocumentKind::General, "Highlander Radio Upgrade", "general");
        doc.content = Some("Fits 2012 and 2013 production years".into());
        let score = score_for(&doc, "Highlander 2012 radio upgrade");
        assert!(score > 0, "score was {}", score);
    }

    #[test]
    fn model_missing_from_title_hard_excludes() {
        let mut doc = Document::new(DocumentKind::General, "Corolla Radio Upgrade", "general");
        doc.content = Some("Mentions Highlander in passing".into());
        let score = score_for(&doc, "Highlander radio upgrade");
        assert_eq!(score, HARD_EXCLUDE);
    }

    #[test]
    fn brand_only_query_never_excludes() {
        let doc = Document::new(DocumentKind::General, "Corolla Radio Upgrade", "general");
        let score = score_for(&doc, "Toyota radio upgrade");
        assert!(score > HARD_EXCLUDE);
        assert!(score >= 0);
    }

    #[test]
    fn brand_in_title_earns_bonus() {
        let plain = Document::new(DocumentKind::General, "Radio Upgrade Guide", "general");
        let branded = Document::new(DocumentKind::General, "Toyota Radio Upgrade Guide", "general");
        assert!(score_for(&branded, "Toyota radio upgrade") > score_for(&plain, "Toyota radio upgrade"));
    }

    #[test]
    fn troubleshooting_excludes_plain_install_video() {
        let doc = Document::new(DocumentKind::Video, "Highlander Installation Video", "installation");
        let q = query("蓝牙没有声音");
        let intent = IntentClassifier::new().classify(&q.text);
        let keywords = rule_based_keywords(&q, 20);
        let score = score_document(&doc, &q, &intent, &keywords);
        assert_eq!(score, TROUBLESHOOT_MISMATCH);
    }

    #[test]
    fn troubleshooting_keeps_install_video_with_problem_overlap() {
        let mut doc = Document::new(DocumentKind::Video, "Highlander Installation Video", "installation");
        doc.summary = Some("Includes bluetooth pairing and audio checks".into());
        let q = query("蓝牙没有声音");
        let intent = IntentClassifier::new().classify(&q.text);
        let keywords = rule_based_keywords(&q, 20);
        let score = score_document(&doc, &q, &intent, &keywords);
        assert!(score > TROUBLESHOOT_MISMATCH);
    }

    #[test]
    fn exact_phrase_outranks_partial_match() {
        let mut exact = Document::new(DocumentKind::General, "Steering wheel control setup", "features");
        exact.summary = Some("steering wheel control setup".into());
        let partial = Document::new(DocumentKind::General, "Steering wheel control overview", "features");
        let question = "steering wheel control setup";
        assert!(score_for(&exact, question) > score_for(&partial, question));
    }

    #[test]
    fn compatibility_intent_boosts_structured_doc() {
        let mut structured = Document::new(DocumentKind::Structured, "Camry Head Unit Fitment", "compatibility");
        structured.compatible_models.push(CompatibleModel {
            name: "Camry 2007-2011".into(),
            description: None,
        });
        structured.faqs.push(Faq {
            title: "Will it retain steering wheel control".into(),
            description: "Yes".into(),
        });
        let general = Document::new(DocumentKind::General, "Camry Head Unit Overview", "general");
        let question = "is it compatible with my Camry";
        assert!(score_for(&structured, question) > score_for(&general, question));
    }

    #[test]
    fn compatible_model_list_match_earns_large_bonus() {
        let mut with_list = Document::new(DocumentKind::Structured, "Highlander Fitment Guide", "compatibility");
        with_list.compatible_models.push(CompatibleModel {
            name: "Highlander XU40".into(),
            description: Some("2008-2013".into()),
        });
        let without_list = Document::new(DocumentKind::Structured, "Highlander Fitment Guide", "compatibility");
        let question = "is the unit compatible with Highlander";
        assert!(score_for(&with_list, question) > score_for(&without_list, question));
    }

    #[test]
    fn title_cluster_bonus_applies() {
        let clustered = Document::new(
            DocumentKind::General,
            "Backup camera wiring guide with harness diagram",
            "installation",
        );
        let sparse = Document::new(DocumentKind::General, "Backup camera overview", "installation");
        let question = "backup camera wiring harness diagram";
        assert!(score_for(&clustered, question) > score_for(&sparse, question));
    }
}
