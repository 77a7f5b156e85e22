//! Embedding stage: one batched embed call per run, cosine similarity.

use std::collections::HashMap;
use std::sync::Arc;

use canon_core::traits::Embedder;
use canon_core::{CanonError, CanonResult};

/// Embeds entity names and scores pairs by cosine similarity.
pub struct EmbeddingScorer {
    embedder: Arc<dyn Embedder>,
    cache: HashMap<String, Vec<f32>>,
}

impl EmbeddingScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            cache: HashMap::new(),
        }
    }

    /// Embed every `(key, text)` not already cached, in one batch call.
    ///
    /// `key` is the normalized name; `text` the surface form sent to the model.
    pub async fn prepare(&mut self, names: &[(String, String)]) -> CanonResult<()> {
        let mut keys = Vec::new();
        let mut texts = Vec::new();
        for (key, text) in names {
            if !self.cache.contains_key(key) && !keys.contains(key) {
                keys.push(key.clone());
                texts.push(text.clone());
            }
        }
        if texts.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_names(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(CanonError::embedding(format!(
                "Embedder '{}' returned {} vectors for {} names",
                self.embedder.model_name(),
                embeddings.len(),
                texts.len()
            )));
        }

        tracing::debug!("Embedded {} entity names", texts.len());
        self.cache.extend(keys.into_iter().zip(embeddings));
        Ok(())
    }

    /// Cosine similarity of two cached names; `None` if either is missing.
    pub fn score(&self, a: &str, b: &str) -> Option<f32> {
        let a = self.cache.get(a)?;
        let b = self.cache.get(b)?;
        Some(cosine_similarity(a, b))
    }

    pub fn get(&self, key: &str) -> Option<&Vec<f32>> {
        self.cache.get(key)
    }

    /// Hand over every embedding computed so far.
    pub fn into_embeddings(self) -> HashMap<String, Vec<f32>> {
        self.cache
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > f32::EPSILON && norm_b > f32::EPSILON {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
