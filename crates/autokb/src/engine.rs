//! Query resolution engine.
//!
//! Orchestrates the full pipeline: language detection → keyword extraction →
//! candidate retrieval → scoring → ranking/truncation → either a direct
//! answer, a disambiguation prompt, or general-knowledge mode. The engine is
//! stateless across turns: the disambiguation list lives in the response and
//! is echoed back by the caller, so instances scale horizontally.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::completion::{CompletionParams, CompletionService};
use crate::config::EngineConfig;
use crate::context::{build_system_prompt, post_process, render_document};
use crate::error::EngineError;
use crate::intent::IntentClassifier;
use crate::keywords::{rule_based_keywords, KeywordExtractor};
use crate::language::detect_language;
use crate::ranking::rank_and_truncate;
use crate::retrieval;
use crate::scoring::score_document;
use crate::selection::{
    build_selection_message, match_sections, resolve_selection, SelectionResolution,
};
use crate::store::DocumentStore;
use crate::types::{
    ConversationMessage, Document, EngineResponse, Query, ScoredCandidate, Section, TokenUsage,
};

pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
    completion: Option<Arc<dyn CompletionService>>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        completion: Option<Arc<dyn CompletionService>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            completion,
            config,
        }
    }

    /// Resolve a free-text question against the corpus.
    ///
    /// Returns a direct answer when exactly one document is meaningfully
    /// relevant, a numbered selection prompt when several are, and a
    /// general-knowledge answer when none clears the relevance floor.
    pub async fn resolve(
        &self,
        question: &str,
        history: &[ConversationMessage],
    ) -> EngineResponse {
        let query = Query {
            text: question.to_string(),
            language: detect_language(question),
        };
        let intent = IntentClassifier::new().classify(question);

        let extractor = KeywordExtractor::new(
            self.completion.clone(),
            &self.config.completion,
            self.config.scoring.max_keywords,
        );
        let extraction = extractor.extract(&query).await;

        tracing::info!(
            question,
            language = ?query.language,
            intent = ?intent,
            keyword_count = extraction.keywords.len(),
            "resolving query"
        );

        let candidates = retrieval::retrieve(
            &self.store,
            &extraction.keywords,
            self.config.completion.retrieval_timeout_secs,
        )
        .await;

        let scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|document| {
                let score = score_document(&document, &query, &intent, &extraction.keywords);
                ScoredCandidate { document, score }
            })
            .collect();
        let mut ranked = rank_and_truncate(scored, &intent, &self.config.scoring);

        if ranked.is_empty() {
            tracing::info!("no candidate cleared the relevance floor, answering from general knowledge");
            return self
                .complete_answer(None, &query, history, extraction.usage, Vec::new())
                .await;
        }

        if ranked.len() == 1 {
            let document = ranked.remove(0).document;
            let matched_sections = match_sections(&document.sections, &extraction.keywords);
            return self
                .answer_with_document(document, matched_sections, &query, history, extraction.usage)
                .await;
        }

        let sources: Vec<Document> = ranked.into_iter().map(|c| c.document).collect();
        tracing::info!(count = sources.len(), "near-tied candidates, asking the user to choose");
        let message = build_selection_message(&sources, query.language);
        let mut response = EngineResponse::selection(message, sources);
        response.usage = extraction.usage;
        response
    }

    /// Second turn of the disambiguation protocol. `sources` must be the
    /// list returned with `requires_selection`, in the same order.
    pub async fn resolve_selection(
        &self,
        reply: &str,
        sources: Vec<Document>,
        question: &str,
        history: &[ConversationMessage],
    ) -> EngineResponse {
        if sources.is_empty() {
            return EngineResponse::failure(EngineError::InvalidSelection(
                "the selection list is empty".to_string(),
            ));
        }

        let query = Query {
            text: question.to_string(),
            language: detect_language(question),
        };
        // Sections are matched against the original query's keywords; the
        // deterministic extraction path avoids a second AI round-trip.
        let keywords = rule_based_keywords(&query, self.config.scoring.max_keywords);

        match resolve_selection(reply, &sources, &keywords, query.language) {
            SelectionResolution::Invalid { message } => {
                EngineResponse::selection(message, sources)
            }
            SelectionResolution::Chosen {
                document,
                matched_sections,
            } => {
                self.answer_with_document(document, matched_sections, &query, history, None)
                    .await
            }
        }
    }

    async fn answer_with_document(
        &self,
        document: Document,
        matched_sections: Vec<Section>,
        query: &Query,
        history: &[ConversationMessage],
        extra_usage: Option<TokenUsage>,
    ) -> EngineResponse {
        let context = render_document(&document, &matched_sections, query.language);
        self.complete_answer(Some(context), query, history, extra_usage, vec![document])
            .await
    }

    async fn complete_answer(
        &self,
        context: Option<String>,
        query: &Query,
        history: &[ConversationMessage],
        extra_usage: Option<TokenUsage>,
        sources: Vec<Document>,
    ) -> EngineResponse {
        let Some(service) = self.completion.as_ref() else {
            return EngineResponse::failure(EngineError::CompletionUnavailable);
        };

        let system_prompt = build_system_prompt(context.as_deref(), query.language);
        let mut messages: Vec<ConversationMessage> = history.to_vec();
        messages.push(ConversationMessage {
            role: "user".to_string(),
            content: query.text.clone(),
        });
        let params = CompletionParams {
            model: self.config.completion.model.clone(),
            temperature: self.config.completion.temperature,
            max_tokens: self.config.completion.max_tokens,
        };

        let timeout_secs = self.config.completion.request_timeout_secs;
        let call = service.complete(&system_prompt, &messages, &params);
        match timeout(Duration::from_secs(timeout_secs), call).await {
            Ok(Ok(completion)) => {
                let message = post_process(&completion.text);
                let usage = match extra_usage {
                    Some(extra) => extra.add(completion.usage),
                    None => completion.usage,
                };
                EngineResponse::answer(message, sources, Some(usage))
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "completion service failed");
                EngineResponse::failure(EngineError::CompletionFailed(e.to_string()))
            }
            Err(_) => {
                tracing::error!(timeout_secs, "completion service timed out");
                EngineResponse::failure(EngineError::CompletionTimeout(timeout_secs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use crate::completion::Completion;
    use crate::store::{MemoryDocumentStore, StoreQuery};
    use crate::types::DocumentKind;

    struct MockCompletion {
        reply: String,
        fail: bool,
    }

    impl MockCompletion {
        fn replying(reply: &str) -> Arc<dyn CompletionService> {
            Arc::new(Self {
                reply: reply.to_string(),
                fail: false,
            })
        }

        fn failing() -> Arc<dyn CompletionService> {
            Arc::new(Self {
                reply: String::new(),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl CompletionService for MockCompletion {
        async fn complete(
            &self,
            _system_prompt: &str,
            _messages: &[ConversationMessage],
            _params: &CompletionParams,
        ) -> anyhow::Result<Completion> {
            if self.fail {
                return Err(anyhow!("upstream unavailable"));
            }
            Ok(Completion {
                text: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn search(&self, _query: &StoreQuery) -> anyhow::Result<Vec<Document>> {
            Err(anyhow!("store down"))
        }
    }

    fn highlander_corpus() -> Vec<Document> {
        let mut fits = Document::new(
            DocumentKind::Video,
            "Highlander 2008-2013 Installation Video",
            "installation",
        );
        fits.summary = Some("Covers model years 2008 2009 2010 2011 2012 2013".into());

        let mut other_years = Document::new(
            DocumentKind::Video,
            "Highlander 2014 Installation Video",
            "installation",
        );
        other_years.summary = Some("Covers the 2014 refresh".into());

        let mut unrelated = Document::new(
            DocumentKind::General,
            "Camry Bluetooth Troubleshooting",
            "troubleshooting",
        );
        unrelated.summary = Some("Bluetooth pairing and audio fixes for Camry".into());

        vec![fits, other_years, unrelated]
    }

    fn engine(corpus: Vec<Document>, completion: Option<Arc<dyn CompletionService>>) -> QueryEngine {
        QueryEngine::new(
            Arc::new(MemoryDocumentStore::new(corpus)),
            completion,
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn single_survivor_answers_directly() {
        let engine = engine(
            highlander_corpus(),
            Some(MockCompletion::replying("**Route the harness** behind the glovebox.")),
        );
        let response = engine
            .resolve("Highlander 2008-2013 installation video", &[])
            .await;

        assert!(response.success, "error: {:?}", response.error);
        assert_eq!(
            response.message.as_deref(),
            Some("Route the harness behind the glovebox.")
        );
        let sources = response.sources.expect("sources present");
        assert_eq!(sources.len(), 1);
        assert!(sources[0].title.contains("2008-2013"));
        // AI keyword extraction plus the answer call both report usage.
        assert_eq!(response.usage.expect("usage present").total_tokens, 30);
    }

    #[tokio::test]
    async fn year_mismatch_never_surfaces() {
        let engine = engine(highlander_corpus(), Some(MockCompletion::replying("ok")));
        let response = engine.resolve("Highlander 2012 installation", &[]).await;

        assert!(response.success);
        let sources = response.sources.expect("sources present");
        for source in &sources {
            let haystack = format!(
                "{} {}",
                source.title,
                source.summary.as_deref().unwrap_or("")
            );
            assert!(haystack.contains("2012"), "year filter leaked: {}", source.title);
        }
    }

    #[tokio::test]
    async fn near_ties_require_selection_and_round_trip() {
        let part_one = Document::new(
            DocumentKind::Video,
            "Highlander Installation Video Part 1",
            "installation",
        );
        let part_two = Document::new(
            DocumentKind::Video,
            "Highlander Installation Video Part 2",
            "installation",
        );
        let engine = engine(
            vec![part_one, part_two],
            Some(MockCompletion::replying("Torque the bracket bolts to spec.")),
        );

        let first = engine.resolve("Highlander installation", &[]).await;
        assert_eq!(first.requires_selection, Some(true));
        let sources = first.sources.expect("selection sources");
        assert_eq!(sources.len(), 2);
        let expected = sources[1].clone();

        let second = engine
            .resolve_selection("2", sources, "Highlander installation", &[])
            .await;
        assert!(second.success);
        assert_eq!(second.requires_selection, None);
        let chosen = second.sources.expect("chosen source");
        assert_eq!(chosen[0].id, expected.id);
    }

    #[tokio::test]
    async fn invalid_selection_reprompts_without_mutating() {
        let sources: Vec<Document> = (1..=4)
            .map(|i| {
                Document::new(
                    DocumentKind::General,
                    format!("Highlander Guide {}", i),
                    "general",
                )
            })
            .collect();
        let engine = engine(Vec::new(), Some(MockCompletion::replying("ok")));

        let response = engine
            .resolve_selection("5", sources.clone(), "Highlander guide", &[])
            .await;

        assert!(response.success);
        assert_eq!(response.requires_selection, Some(true));
        let echoed = response.sources.expect("list re-offered");
        assert_eq!(echoed.len(), 4);
        for (echoed, original) in echoed.iter().zip(&sources) {
            assert_eq!(echoed.id, original.id);
        }
    }

    #[tokio::test]
    async fn chinese_troubleshooting_scenario() {
        let mut fix = Document::new(
            DocumentKind::General,
            "Camry Bluetooth No Sound Fix",
            "troubleshooting",
        );
        fix.summary = Some("Bluetooth no sound checklist".into());
        let install_only = Document::new(
            DocumentKind::Video,
            "Camry Installation Video",
            "installation",
        );
        let engine = engine(
            vec![fix, install_only],
            Some(MockCompletion::replying("请先重新配对蓝牙。")),
        );

        let response = engine.resolve("蓝牙没有声音", &[]).await;
        assert!(response.success);
        let sources = response.sources.expect("sources present");
        assert_eq!(sources.len(), 1);
        assert!(sources[0].title.contains("Bluetooth"));
    }

    #[tokio::test]
    async fn store_failure_falls_back_to_general_knowledge() {
        let engine = QueryEngine::new(
            Arc::new(FailingStore),
            Some(MockCompletion::replying("General guidance.")),
            EngineConfig::default(),
        );
        let response = engine.resolve("Highlander radio upgrade", &[]).await;

        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("General guidance."));
        assert!(response.sources.expect("sources field present").is_empty());
    }

    #[tokio::test]
    async fn completion_failure_surfaces_typed_error() {
        let engine = engine(highlander_corpus(), Some(MockCompletion::failing()));
        let response = engine
            .resolve("Highlander 2008-2013 installation video", &[])
            .await;

        assert!(!response.success);
        let error = response.error.expect("typed error surfaced");
        assert!(error.contains("completion service failed"), "error: {}", error);
    }

    #[tokio::test]
    async fn missing_completion_service_is_reported() {
        let engine = engine(highlander_corpus(), None);
        let response = engine
            .resolve("Highlander 2008-2013 installation video", &[])
            .await;

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("no completion service is configured")
        );
    }
}
