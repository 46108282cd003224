//! Completion service collaborator.
//!
//! The engine needs exactly one operation from a language model: a blocking
//! "complete chat" call with configurable model, temperature and token limit.
//! The service may be slow or fail; callers apply their own timeout.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::types::{ConversationMessage, TokenUsage};

#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ConversationMessage],
        params: &CompletionParams,
    ) -> Result<Completion>;
}

// ============================================================================
// OpenAI-compatible HTTP provider
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageWire>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageWire {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct HttpCompletionService {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HttpCompletionService {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(300))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Parse a response body as JSON, returning a clear error if the server
    /// returned HTML (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

        // CDNs/proxies sometimes return 200 with an HTML error page.
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') || trimmed.starts_with("<!") {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}): {}",
                endpoint,
                status,
                preview
            ));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ConversationMessage],
        params: &CompletionParams,
    ) -> Result<Completion> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        wire_messages.push(json!({ "role": "system", "content": system_prompt }));
        for message in messages {
            wire_messages.push(json!({ "role": message.role, "content": message.content }));
        }

        let body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "messages": wire_messages,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Completion request to {} failed: {}", self.endpoint, e))?;

        let parsed: ChatCompletionResponse =
            Self::parse_json_response(response, &self.endpoint).await?;

        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("Completion response from {} had no content", self.endpoint))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_without_usage() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).expect("valid wire json");
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn chat_response_parses_usage() {
        let body = r#"{"choices":[{"message":{"content":"hi"}}],"usage":{"prompt_tokens":12,"completion_tokens":4,"total_tokens":16}}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).expect("valid wire json");
        let usage = parsed.usage.expect("usage present");
        assert_eq!(usage.total_tokens, 16);
    }
}
