//! canon-llm - LLM provider implementations for canon.
//!
//! The deduplicator asks an LLM to settle entity pairs that neither fuzzy
//! matching nor embeddings could decide.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - GPT-4.1, o-series, etc.
//! - **Ollama** (feature: `ollama`) - Local models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use canon_llm::LlmFactory;
//!
//! let llm = LlmFactory::openai_with_model("gpt-4.1-mini")?;
//! ```

mod factory;
mod ollama;
mod openai;

pub use factory::LlmFactory;
pub use ollama::{OllamaLlm, DEFAULT_OLLAMA_MODEL};
pub use openai::{OpenAIProvider, DEFAULT_OPENAI_MODEL};

// Re-export core types for convenience
pub use canon_core::traits::{Llm, LlmConfig, LlmProvider, LlmResponse, Prompt};
