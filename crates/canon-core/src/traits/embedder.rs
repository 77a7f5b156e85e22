//! Embedder trait and configuration for the embedding stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CanonResult;

/// Turns entity names into vectors for cosine comparison.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `names`, one vector per name in input order.
    ///
    /// Providers split the request into `batch_size` chunks themselves.
    async fn embed_names(&self, names: &[String]) -> CanonResult<Vec<Vec<f32>>>;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Embedding model settings, the `[embedder.config]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Names per provider request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_dimensions() -> usize {
    1536
}

fn default_batch_size() -> usize {
    256
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderProvider {
    #[default]
    OpenAI,
    Ollama,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_batch_size() {
        let config: EmbedderConfig = toml::from_str(
            r#"
            model = "nomic-embed-text"
            dimensions = 768
            "#,
        )
        .unwrap();
        assert_eq!(config.dimensions, 768);
        assert_eq!(config.batch_size, 256);
    }
}
