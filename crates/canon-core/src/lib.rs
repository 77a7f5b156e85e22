//! canon-core - Core library for canon.
//!
//! This crate provides the data model, provider traits, error type and
//! configuration shared by the canon entity extraction and deduplication
//! pipeline.
//!
//! # Example
//!
//! ```ignore
//! use canon_core::{PipelineConfig, TextUnit};
//!
//! let config = PipelineConfig::from_file("canon.toml")?;
//! let units = vec![TextUnit::new("chunk-1", "Tim Cook is the CEO of Apple.")];
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{
    ClassifierConfig, DedupConfig, EmbedderProviderConfig, FilterConfig, LlmProviderConfig,
    NerServiceConfig, PipelineConfig, PresetDefinition,
};
pub use error::{CanonError, CanonResult, ErrorCode};
pub use traits::{
    Classifier, Embedder, EmbedderConfig, EmbedderProvider, Llm, LlmConfig, LlmProvider,
    LlmResponse, Prompt, SchemaExtractor,
};
pub use types::{
    CanonicalEntity, DomainClassification, DomainKey, EdgeKind, EntityGraphDelta,
    ExtractedEntity, ExtractedRelation, ExtractionResponse, ExtractionSchema, GraphNode,
    GraphRelationship, IngestionGraph, MatchStage, Span, TextUnit,
};
