//! Disambiguation flow.
//!
//! When ranking leaves more than one near-tied candidate, the engine asks the
//! user to pick instead of guessing. The protocol is two turns and stateless:
//! the numbered list is returned to the caller, who echoes it back verbatim
//! alongside the numeric reply. The resolver therefore always sees the exact
//! ordering that was displayed.

use crate::language::Language;
use crate::types::{Document, DocumentKind, Section};

/// Weight for a keyword hit in a section heading.
const HEADING_HIT: i32 = 10;
/// Weight for a keyword hit in section content.
const CONTENT_HIT: i32 = 5;
/// Bonus when a keyword occurs inside a longer word the whole-field checks
/// miss.
const SUBSTRING_HIT: i32 = 2;
/// How many matched sections narrow the rendered context.
const MAX_MATCHED_SECTIONS: usize = 3;

pub enum SelectionResolution {
    Chosen {
        document: Document,
        matched_sections: Vec<Section>,
    },
    Invalid {
        message: String,
    },
}

/// Render the numbered selection list in the query's language. The index
/// shown here is the index the resolver accepts: 1-based, display order.
pub fn build_selection_message(documents: &[Document], language: Language) -> String {
    let mut lines = Vec::with_capacity(documents.len() + 2);
    match language {
        Language::Zh => lines.push("找到多个相关文档，请回复编号选择：".to_string()),
        Language::En => {
            lines.push("I found several relevant documents. Reply with a number to choose:".to_string())
        }
    }
    for (i, document) in documents.iter().enumerate() {
        lines.push(format!("{}. {} — {}", i + 1, document.title, kind_blurb(document, language)));
    }
    lines.join("\n")
}

fn kind_blurb(document: &Document, language: Language) -> String {
    let summary_snippet = || {
        document
            .summary
            .as_deref()
            .or(document.description.as_deref())
            .map(|s| truncate_chars(s, 60))
    };
    match (document.kind, language) {
        (DocumentKind::Video, Language::Zh) => {
            format!("视频教程（{}个视频）", document.videos.len().max(1))
        }
        (DocumentKind::Video, Language::En) => {
            format!("video guide ({} clips)", document.videos.len().max(1))
        }
        (DocumentKind::Structured, Language::Zh) => {
            format!("兼容性资料（{}款车型）", document.compatible_models.len())
        }
        (DocumentKind::Structured, Language::En) => {
            format!("compatibility data ({} models)", document.compatible_models.len())
        }
        (DocumentKind::General, Language::Zh) => {
            summary_snippet().unwrap_or_else(|| "图文文档".to_string())
        }
        (DocumentKind::General, Language::En) => {
            summary_snippet().unwrap_or_else(|| "reference document".to_string())
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}…", truncated)
    }
}

/// Resolve a numeric reply against the list the caller echoed back. An
/// out-of-range or non-numeric reply re-prompts with the same list; nothing
/// is mutated.
pub fn resolve_selection(
    reply: &str,
    sources: &[Document],
    keywords: &[String],
    language: Language,
) -> SelectionResolution {
    let index = match parse_index(reply) {
        Some(i) if i >= 1 && i <= sources.len() => i,
        _ => {
            tracing::debug!(reply, count = sources.len(), "invalid selection reply");
            let notice = match language {
                Language::Zh => format!("无效的选择，请回复 1 到 {} 之间的编号。", sources.len()),
                Language::En => format!(
                    "That is not a valid choice. Please reply with a number between 1 and {}.",
                    sources.len()
                ),
            };
            return SelectionResolution::Invalid {
                message: format!("{}\n{}", notice, build_selection_message(sources, language)),
            };
        }
    };

    let document = sources[index - 1].clone();
    let matched_sections = match_sections(&document.sections, keywords);
    SelectionResolution::Chosen {
        document,
        matched_sections,
    }
}

/// First run of ASCII digits in the reply, so "3", "3.", "选3" all resolve.
fn parse_index(reply: &str) -> Option<usize> {
    let digits: String = reply
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Re-score a chosen document's sections against the original query's
/// keywords, keeping the best few as the preferred context. The full section
/// list stays available as fallback when nothing matches.
pub fn match_sections(sections: &[Section], keywords: &[String]) -> Vec<Section> {
    let mut scored: Vec<(i32, &Section)> = sections
        .iter()
        .map(|section| (section_score(section, keywords), section))
        .filter(|(score, _)| *score > 0)
        .collect();
    // Stable by score: equal-scoring sections keep document order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_MATCHED_SECTIONS)
        .map(|(_, section)| section.clone())
        .collect()
}

fn section_score(section: &Section, keywords: &[String]) -> i32 {
    let heading = section.heading.to_lowercase();
    let content = section.content.to_lowercase();
    let mut score = 0;
    for keyword in keywords {
        let keyword = keyword.to_lowercase();
        if heading.contains(&keyword) {
            score += HEADING_HIT;
        }
        if content.contains(&keyword) {
            score += CONTENT_HIT;
        }
        if keyword.chars().count() > 3 {
            let inside_longer_word = |field: &str| {
                field
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word.len() > keyword.len() && word.contains(keyword.as_str()))
            };
            if inside_longer_word(&heading) || inside_longer_word(&content) {
                score += SUBSTRING_HIT;
            }
        }
    }
    score
}
