//! LLM trait, prompt and provider configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CanonResult;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Ask the provider for a JSON object reply.
    pub json: bool,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json: false,
        }
    }

    /// Request a JSON object reply.
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Completion text plus provider-reported usage.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Create a response carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            usage: None,
        }
    }

    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Chat model used to settle ambiguous entity pairs.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Run one completion. Sampling parameters come from the provider's config.
    async fn complete(&self, prompt: &Prompt) -> CanonResult<LlmResponse>;

    fn model_name(&self) -> &str;

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(&self) -> bool {
        false
    }
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Ollama,
}

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/identifier.
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Top-p nucleus sampling.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// API key (if not using environment variable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL for API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_top_p() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            api_key: None,
            base_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_json_flag() {
        let prompt = Prompt::new("sys", "user");
        assert!(!prompt.json);
        assert!(prompt.json().json);
    }

    #[test]
    fn test_llm_config_fills_sampling_defaults() {
        let config: LlmConfig = toml::from_str(r#"model = "gpt-4.1-mini""#).unwrap();
        assert_eq!(config.model, "gpt-4.1-mini");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_tokens, 2000);
        assert!(config.api_key.is_none());
    }
}
