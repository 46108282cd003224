pub mod completion;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod intent;
pub mod keywords;
pub mod language;
pub mod ranking;
pub mod retrieval;
pub mod scoring;
pub mod selection;
pub mod store;
pub mod types;

// Re-export primary types for convenience
pub use completion::{Completion, CompletionParams, CompletionService, HttpCompletionService};
pub use config::{CompletionConfig, EngineConfig, ScoringConfig};
pub use engine::QueryEngine;
pub use error::EngineError;
pub use intent::{IntentClassifier, ProblemType, QueryIntent};
pub use language::{detect_language, Language};
pub use store::{DocumentStore, MemoryDocumentStore, StoreQuery};
pub use types::{
    ConversationMessage, Document, DocumentKind, EngineResponse, Query, ScoredCandidate,
    TokenUsage,
};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
