//! canon-embeddings - Embedding provider implementations for canon.
//!
//! Used by the embedding stage of entity deduplication.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - text-embedding-3-small, text-embedding-3-large, etc.
//! - **Ollama** (feature: `ollama`) - Local embedding models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use canon_embeddings::EmbedderFactory;
//!
//! let embedder = EmbedderFactory::openai_with_model("text-embedding-3-large", 3072)?;
//! let embedder = EmbedderFactory::ollama_with_model("nomic-embed-text", 768)?;
//! ```

mod factory;
mod ollama;
mod openai;
mod shape;

pub use factory::EmbedderFactory;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

// Re-export core types for convenience
pub use canon_core::traits::{Embedder, EmbedderConfig, EmbedderProvider};
