//! Local embeddings through an Ollama server.

use async_trait::async_trait;

use canon_core::error::{CanonError, CanonResult};
use canon_core::traits::{Embedder, EmbedderConfig};

use crate::shape::ensure_shape;

#[cfg(feature = "ollama")]
use ollama_rs::{generation::embeddings::request::GenerateEmbeddingsRequest, Ollama};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaEmbedder {
    #[cfg(feature = "ollama")]
    client: Ollama,
    config: EmbedderConfig,
}

impl OllamaEmbedder {
    pub fn new(config: EmbedderConfig) -> CanonResult<Self> {
        let url = url::Url::parse(config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL))
            .map_err(|e| CanonError::Configuration(format!("Invalid Ollama URL: {}", e)))?;

        #[cfg(feature = "ollama")]
        let client = Ollama::new(
            format!("{}://{}", url.scheme(), url.host_str().unwrap_or("localhost")),
            url.port().unwrap_or(11434),
        );
        #[cfg(not(feature = "ollama"))]
        let _ = url;

        Ok(Self {
            #[cfg(feature = "ollama")]
            client,
            config,
        })
    }

    #[cfg(feature = "ollama")]
    async fn embed_chunk(&self, chunk: &[String]) -> CanonResult<Vec<Vec<f32>>> {
        let request = GenerateEmbeddingsRequest::new(self.config.model.clone(), chunk.to_vec().into());
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| CanonError::embedding(format!("Ollama embedding error: {}", e)))?;
        Ok(response.embeddings)
    }

    #[cfg(not(feature = "ollama"))]
    async fn embed_chunk(&self, _chunk: &[String]) -> CanonResult<Vec<Vec<f32>>> {
        Err(CanonError::Configuration(
            "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
        ))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
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
