//! canon-entities - Domain-aware entity extraction and hybrid deduplication.
//!
//! Turns text units into a deduplicated canonical entity graph:
//!
//! - [`DomainClassifier`] tags each unit with one or more domains
//! - [`BatchGrouper`] groups units by domain combination
//! - [`PresetMerger`] builds one extraction schema per combination
//! - [`ExtractionClient`] extracts each group in one call
//! - [`Deduplicator`] merges mentions via fuzzy, embedding and LLM matching
//! - [`CanonicalGraphBuilder`] emits entity nodes and MENTIONS/RELATION edges
//!
//! [`EntityPipeline`] wires them together.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use canon_core::{IngestionGraph, PipelineConfig, TextUnit};
//! use canon_entities::EntityPipeline;
//!
//! let pipeline = EntityPipeline::builder(PipelineConfig::default())
//!     .extractor(Arc::new(ner_client))
//!     .build()?;
//!
//! let mut graph = IngestionGraph::new();
//! let units = vec![TextUnit::new("chunk-1", "Tim Cook is the CEO of Apple.")];
//! let stats = pipeline.transform(&mut graph, &units).await?;
//! pipeline.close();
//! ```

pub mod builder;
pub mod classifier;
pub mod dedup;
pub mod extraction;
pub mod grouper;
pub mod normalize;
pub mod pipeline;
pub mod presets;
pub mod stats;

pub use builder::CanonicalGraphBuilder;
pub use classifier::DomainClassifier;
pub use dedup::{
    CanonicalMapping, CanonicalName, DedupResult, DedupStats, Decision, Deduplicator,
    DuplicatePair, Outcome, PairDecider, Similarities,
};
pub use extraction::{EntityFilter, ExtractionClient, GroupExtraction, UnitExtraction};
pub use grouper::{BatchGrouper, DomainGroup};
pub use normalize::normalize_name;
pub use pipeline::{EntityPipeline, EntityPipelineBuilder, PipelineOutput};
pub use presets::{builtin_presets, PresetMerger, GENERAL_PRESET};
pub use stats::RunStats;
