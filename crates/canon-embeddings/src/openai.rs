//! OpenAI embeddings for entity names.

use async_trait::async_trait;

use canon_core::error::{CanonError, CanonResult};
use canon_core::traits::{Embedder, EmbedderConfig};

use crate::shape::ensure_shape;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};

pub struct OpenAIEmbedder {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: EmbedderConfig,
}

impl OpenAIEmbedder {
    pub fn new(config: EmbedderConfig) -> CanonResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CanonError::Configuration(
                    "OpenAI API key not found. Set OPENAI_API_KEY or embedder.config.api_key."
                        .to_string(),
                )
            })?;

        #[cfg(feature = "openai")]
        let client = {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(ref base_url) = config.base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Only the text-embedding-3 family accepts a requested output width.
    fn requests_dimensions(&self) -> bool {
        self.config.model.starts_with("text-embedding-3")
    }

    #[cfg(feature = "openai")]
    async fn embed_chunk(&self, chunk: &[String]) -> CanonResult<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequest {
            model: self.config.model.clone(),
            input: EmbeddingInput::StringArray(chunk.to_vec()),
            dimensions: self
                .requests_dimensions()
                .then_some(self.config.dimensions as u32),
            ..Default::default()
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| CanonError::embedding(format!("OpenAI embedding error: {}", e)))?;

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    #[cfg(not(feature = "openai"))]
    async fn embed_chunk(&self, _chunk: &[String]) -> CanonResult<Vec<Vec<f32>>> {
        Err(CanonError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_names(&self, names: &[String]) -> CanonResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(names.len());
        for chunk in names.chunks(self.config.batch_size.max(1)) {
            let batch = self.embed_chunk(chunk).await?;
            ensure_shape(&self.config.model, chunk.len(), self.config.dimensions, &batch)?;
            vectors.extend(batch);
        }
        tracing::debug!("Embedded {} names with {}", vectors.len(), self.config.model);
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
