//! Core traits for canon providers.

mod classifier;
mod embedder;
mod extractor;
mod llm;

pub use classifier::*;
pub use embedder::*;
pub use extractor::*;
pub use llm::*;
