use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub completion: CompletionConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Timeout for the final answer-generation call.
    pub request_timeout_secs: u64,
    /// Timeout for the optional AI-assisted keyword extraction call.
    pub extraction_timeout_secs: u64,
    /// Timeout for the candidate-retrieval call against the document store.
    pub retrieval_timeout_secs: u64,
}

/// Ranking constants. The floor and ratio were chosen empirically in the
/// original system; they are preserved here as tunables rather than inferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum score a candidate must reach to be considered relevant.
    pub relevance_floor: i32,
    /// Keep candidates scoring at least `top_score * truncation_ratio`.
    pub truncation_ratio: f32,
    /// Scores closer than this are tie-broken by document type preference.
    pub tie_margin: i32,
    /// Keep at least this many candidates when that many cleared the floor.
    pub min_results: usize,
    /// Cap on the derived keyword set, to bound store query cost.
    pub max_keywords: usize,
}

impl EngineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.completion.model.is_empty() {
            return Err("completion.model must not be empty".into());
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err("completion.temperature must be in [0.0, 2.0]".into());
        }
        if self.completion.max_tokens == 0 {
            return Err("completion.max_tokens must be > 0".into());
        }
        if self.completion.request_timeout_secs == 0 {
            return Err("completion.request_timeout_secs must be > 0".into());
        }
        if self.scoring.relevance_floor < 0 {
            return Err("scoring.relevance_floor must be >= 0".into());
        }
        if !(0.0..=1.0).contains(&self.scoring.truncation_ratio) {
            return Err("scoring.truncation_ratio must be in [0.0, 1.0]".into());
        }
        if self.scoring.tie_margin < 0 {
            return Err("scoring.tie_margin must be >= 0".into());
        }
        if self.scoring.min_results == 0 {
            return Err("scoring.min_results must be > 0".into());
        }
        if self.scoring.max_keywords == 0 {
            return Err("scoring.max_keywords must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, validating after parse.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.3,
                max_tokens: 1500,
                request_timeout_secs: 60,
                extraction_timeout_secs: 20,
                retrieval_timeout_secs: 10,
            },
            scoring: ScoringConfig {
                relevance_floor: 50,
                truncation_ratio: 0.5,
                tie_margin: 10,
                min_results: 3,
                max_keywords: 20,
            },
        }
    }
}
