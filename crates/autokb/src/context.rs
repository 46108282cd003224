//! Context assembly and response post-processing.
//!
//! Renders exactly the chosen document(s) — never the discarded candidate
//! set — into a labeled block for the completion service, wraps it with
//! language-appropriate answer-format rules and the anti-hallucination
//! instructions, and cleans stylistic markup out of the generated answer.

use std::sync::LazyLock;

use regex::Regex;

use crate::language::Language;
use crate::types::{Document, DocumentKind, Section};

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|__").expect("bold regex is valid"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("heading regex is valid"));
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("emphasis regex is valid"));

/// Render one chosen document. `matched_sections` — the re-scored subset
/// from the disambiguation flow — is preferred; the full section list and
/// the raw content field are fallbacks, in that order.
pub fn render_document(
    document: &Document,
    matched_sections: &[Section],
    language: Language,
) -> String {
    let l = Labels::for_language(language);
    let mut block = Vec::new();

    block.push(format!("{}: {}", l.kind, kind_label(document.kind, language)));
    block.push(format!("{}: {}", l.title, document.title));
    if let Some(summary) = document.summary.as_deref().or(document.description.as_deref()) {
        block.push(format!("{}: {}", l.summary, summary));
    }
    block.push(format!("{}: {}", l.category, document.category));

    let sections: &[Section] = if !matched_sections.is_empty() {
        matched_sections
    } else {
        &document.sections
    };
    if !sections.is_empty() {
        block.push(format!("{}:", l.sections));
        for section in sections {
            block.push(format!("- {}: {}", section.heading, section.content));
        }
    } else if let Some(content) = document.content.as_deref() {
        block.push(format!("{}: {}", l.content, content));
    }

    if !document.videos.is_empty() {
        block.push(format!("{}:", l.videos));
        for video in &document.videos {
            block.push(format!("- {}: {}", video.title, video.description));
        }
    }
    if !document.compatible_models.is_empty() {
        block.push(format!("{}:", l.compatible));
        for model in &document.compatible_models {
            match model.description.as_deref() {
                Some(desc) => block.push(format!("- {} ({})", model.name, desc)),
                None => block.push(format!("- {}", model.name)),
            }
        }
    }
    if !document.incompatible_models.is_empty() {
        block.push(format!("{}:", l.incompatible));
        for model in &document.incompatible_models {
            match model.reason.as_deref() {
                Some(reason) => block.push(format!("- {}: {}", model.name, reason)),
                None => block.push(format!("- {}", model.name)),
            }
        }
    }
    if !document.faqs.is_empty() {
        block.push(format!("{}:", l.faqs));
        for faq in &document.faqs {
            block.push(format!("- {}: {}", faq.title, faq.description));
        }
    }

    block.join("\n")
}

/// Build the system prompt for the completion call. `context` is `None` in
/// general-knowledge mode (no candidate cleared the relevance floor) — the
/// grounding rules soften but the presentation rules stay identical.
pub fn build_system_prompt(context: Option<&str>, language: Language) -> String {
    let mut parts = Vec::with_capacity(4);

    parts.push(
        "You are a product support assistant for car stereo head units. \
         Answer the customer's exact question — only the asked sub-question, \
         not a general summary of everything you know."
            .to_string(),
    );

    match context {
        Some(context) => {
            parts.push(format!(
                "Use the reference material below as your source of facts. Do not state \
                 product facts that are not supported by it.\n\n{}",
                context
            ));
        }
        None => {
            parts.push(
                "No specific reference material matched this question. Answer from general \
                 product knowledge, keeping advice generic and safe."
                    .to_string(),
            );
        }
    }

    parts.push(
        "Never say that no information was found and never apologize for missing data — \
         give the customer the most useful answer available. Never mention a knowledge \
         base, reference material, documents, or how you obtained the information."
            .to_string(),
    );

    match language {
        Language::Zh => parts.push(
            "The customer wrote in Chinese. Answer bilingually: Chinese first, then the \
             English equivalent, keeping technical terms (model names, years) unchanged."
                .to_string(),
        ),
        Language::En => {
            parts.push("Answer in English only. Keep the tone direct and practical.".to_string())
        }
    }

    parts.join("\n\n")
}

/// Strip bold/italic/heading markup from the completion output. Structural
/// cleanup only — list bullets and factual content stay untouched.
pub fn post_process(text: &str) -> String {
    let cleaned = BOLD_RE.replace_all(text, "");
    let cleaned = HEADING_RE.replace_all(&cleaned, "");
    let cleaned = EMPHASIS_RE.replace_all(&cleaned, "$1");
    cleaned.trim().to_string()
}

fn kind_label(kind: DocumentKind, language: Language) -> &'static str {
    match (kind, language) {
        (DocumentKind::General, Language::En) => "reference document",
        (DocumentKind::Video, Language::En) => "video guide",
        (DocumentKind::Structured, Language::En) => "compatibility data",
        (DocumentKind::General, Language::Zh) => "图文文档",
        (DocumentKind::Video, Language::Zh) => "视频教程",
        (DocumentKind::Structured, Language::Zh) => "兼容性资料",
    }
}

struct Labels {
    kind: &'static str,
    title: &'static str,
    summary: &'static str,
    category: &'static str,
    sections: &'static str,
    content: &'static str,
    videos: &'static str,
    compatible: &'static str,
    incompatible: &'static str,
    faqs: &'static str,
}

impl Labels {
    fn for_language(language: Language) -> Self {
        match language {
            Language::En => Self {
                kind: "Type",
                title: "Title",
                summary: "Summary",
                category: "Category",
                sections: "Sections",
                content: "Content",
                videos: "Videos",
                compatible: "Compatible models",
                incompatible: "Incompatible models",
                faqs: "FAQs",
            },
            Language::Zh => Self {
                kind: "类型",
                title: "标题",
                summary: "摘要",
                category: "分类",
                sections: "章节",
                content: "内容",
                videos: "视频",
                compatible: "兼容车型",
                incompatible: "不兼容车型",
                faqs: "常见问题",
            },
        }
    }
}
