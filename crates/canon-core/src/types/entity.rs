//! Raw mentions produced by extraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::domain::{clamp_unit, DomainKey};

/// A unit of source text fed into the pipeline (a chunk, a code node, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    /// Identifier of the source node in the caller's graph.
    pub id: String,
    /// Text content.
    pub text: String,
}

impl TextUnit {
    /// Create a new text unit.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Character offsets of a mention inside its text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span; returns `None` when `end < start`.
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }
}

/// An entity mention extracted from one text unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Surface form as extracted.
    pub name: String,
    /// Entity type (open vocabulary, lowercase).
    pub entity_type: String,
    /// Extraction confidence in [0, 1].
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Index of the originating unit in the input batch.
    pub unit_index: usize,
    /// Domains of the group this mention was extracted under.
    #[serde(default)]
    pub detected_domains: DomainKey,
}

impl ExtractedEntity {
    /// Create a new mention with full confidence.
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>, unit_index: usize) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into().trim().to_lowercase(),
            confidence: 1.0,
            span: None,
            aliases: Vec::new(),
            properties: BTreeMap::new(),
            unit_index,
            detected_domains: DomainKey::default(),
        }
    }

    /// Set the confidence, clamped into [0, 1].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    /// Set the span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add an alias reported by the extractor.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Stamp the domains of the extraction group.
    pub fn with_domains(mut self, domains: DomainKey) -> Self {
        self.detected_domains = domains;
        self
    }
}

/// A relation between two mentions, referencing them by extracted name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub unit_index: usize,
    #[serde(default)]
    pub detected_domains: DomainKey,
}

impl ExtractedRelation {
    /// Create a new relation with full confidence.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        unit_index: usize,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: 1.0,
            span: None,
            unit_index,
            detected_domains: DomainKey::default(),
        }
    }

    /// Set the confidence, clamped into [0, 1].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    /// Stamp the domains of the extraction group.
    pub fn with_domains(mut self, domains: DomainKey) -> Self {
        self.detected_domains = domains;
        self
    }
}

/// Which stage of the deduplication cascade produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchStage {
    /// String similarity on normalized names.
    Fuzzy,
    /// Cosine similarity of name embeddings.
    Embedding,
    /// Batched LLM judgment.
    Llm,
}
