use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::language::Language;

// ============================================================================
// Corpus documents
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    General,
    Video,
    Structured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoItem {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibleModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompatibleModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A corpus record as returned by the document store. The engine only reads
/// snapshots; identity is stable across scoring and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub videos: Vec<VideoItem>,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    #[serde(default)]
    pub compatible_models: Vec<CompatibleModel>,
    #[serde(default)]
    pub incompatible_models: Vec<IncompatibleModel>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

impl Document {
    pub fn new(kind: DocumentKind, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            category: category.into(),
            summary: None,
            description: None,
            content: None,
            sections: Vec::new(),
            videos: Vec::new(),
            faqs: Vec::new(),
            compatible_models: Vec::new(),
            incompatible_models: Vec::new(),
            published: true,
        }
    }
}

// ============================================================================
// Per-request values
// ============================================================================

/// Immutable per-request query value, created once from the raw question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub document: Document,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

// ============================================================================
// Caller-facing result
// ============================================================================

/// The structured result returned across the subsystem boundary. Nothing in
/// the engine throws past this shape. When `requires_selection` is true,
/// `sources` holds the disambiguation list in display order and must be
/// echoed back verbatim by the caller on the follow-up turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_selection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineResponse {
    pub fn answer(message: String, sources: Vec<Document>, usage: Option<TokenUsage>) -> Self {
        Self {
            success: true,
            message: Some(message),
            sources: Some(sources),
            requires_selection: None,
            usage,
            error: None,
        }
    }

    pub fn selection(message: String, sources: Vec<Document>) -> Self {
        Self {
            success: true,
            message: Some(message),
            sources: Some(sources),
            requires_selection: Some(true),
            usage: None,
            error: None,
        }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            message: None,
            sources: None,
            requires_selection: None,
            usage: None,
            error: Some(error.to_string()),
        }
    }
}
