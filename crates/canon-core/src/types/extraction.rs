//! Response shapes returned by a schema-driven extraction service.
//!
//! Services answer in one of two layouts per text: entities grouped by type
//! (names only) or a flat list carrying confidence and offsets. Both are
//! modelled as untagged enums so either layout decodes directly; the
//! extraction client flattens them into `ExtractedEntity` values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Extraction output for a single text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub entities: EntityPayload,
    #[serde(default, alias = "relation_extraction")]
    pub relations: RelationPayload,
}

impl ExtractionResponse {
    /// Check if the response carries nothing.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// Entities in either of the two supported layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityPayload {
    /// `[{"text": ..., "label": ..., "confidence": ..., "start": ..., "end": ...}]`
    Flat(Vec<RawEntity>),
    /// `{"person": ["Tim Cook"], "organization": ["Apple"]}`
    Grouped(BTreeMap<String, Vec<String>>),
}

impl Default for EntityPayload {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl EntityPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(items) => items.is_empty(),
            Self::Grouped(groups) => groups.values().all(Vec::is_empty),
        }
    }
}

/// A flat-layout entity as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(alias = "text")]
    pub name: String,
    #[serde(alias = "label", alias = "type", alias = "entity_type")]
    pub entity_type: String,
    #[serde(default, alias = "score")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Relations in either supported layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationPayload {
    /// `[{"subject": ..., "predicate": ..., "object": ..., "confidence": ...}]`
    Flat(Vec<RawRelation>),
    /// `{"works_for": [["Tim Cook", "Apple"]]}`
    Grouped(BTreeMap<String, Vec<RelationTuple>>),
}

impl Default for RelationPayload {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl RelationPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(items) => items.is_empty(),
            Self::Grouped(groups) => groups.values().all(Vec::is_empty),
        }
    }
}

/// A flat-layout relation as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelation {
    #[serde(alias = "head", alias = "source")]
    pub subject: String,
    #[serde(alias = "relation", alias = "label", alias = "type")]
    pub predicate: String,
    #[serde(alias = "tail", alias = "target")]
    pub object: String,
    #[serde(default, alias = "score")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

/// One (subject, object) pair under a grouped predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationTuple {
    /// `["Tim Cook", "Apple"]`
    Pair(String, String),
    /// `{"head": "Tim Cook", "tail": "Apple"}`
    Object {
        #[serde(alias = "head", alias = "source")]
        subject: String,
        #[serde(alias = "tail", alias = "target")]
        object: String,
    },
}

impl RelationTuple {
    /// The (subject, object) names.
    pub fn endpoints(&self) -> (&str, &str) {
        match self {
            Self::Pair(s, o) => (s, o),
            Self::Object { subject, object } => (subject, object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_grouped_layout() {
        let json = r#"{
            "entities": {"person": ["Tim Cook"], "organization": ["Apple", "Microsoft"]},
            "relation_extraction": {"works_for": [["Tim Cook", "Apple"]]}
        }"#;

        let response: ExtractionResponse = serde_json::from_str(json).unwrap();
        match &response.entities {
            EntityPayload::Grouped(groups) => {
                assert_eq!(groups["organization"].len(), 2);
            }
            other => panic!("expected grouped payload, got {:?}", other),
        }
        match &response.relations {
            RelationPayload::Grouped(groups) => {
                assert_eq!(groups["works_for"][0].endpoints(), ("Tim Cook", "Apple"));
            }
            other => panic!("expected grouped relations, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_flat_layout_with_aliases() {
        let json = r#"{
            "entities": [
                {"text": "Tim Cook", "label": "person", "score": 0.91, "start": 0, "end": 8}
            ],
            "relations": [
                {"head": "Tim Cook", "relation": "works_for", "tail": "Apple", "confidence": 0.7}
            ]
        }"#;

        let response: ExtractionResponse = serde_json::from_str(json).unwrap();
        match &response.entities {
            EntityPayload::Flat(items) => {
                assert_eq!(items[0].name, "Tim Cook");
                assert_eq!(items[0].entity_type, "person");
                assert_eq!(items[0].confidence, Some(0.91));
                assert_eq!(items[0].end, Some(8));
            }
            other => panic!("expected flat payload, got {:?}", other),
        }
        match &response.relations {
            RelationPayload::Flat(items) => assert_eq!(items[0].object, "Apple"),
            other => panic!("expected flat relations, got {:?}", other),
        }
    }

    #[test]
    fn test_grouped_relation_object_form() {
        let json = r#"{"relations": {"founded": [{"head": "Jobs", "tail": "Apple"}]}}"#;
        let response: ExtractionResponse = serde_json::from_str(json).unwrap();
        assert!(response.entities.is_empty());
        match &response.relations {
            RelationPayload::Grouped(groups) => {
                assert_eq!(groups["founded"][0].endpoints(), ("Jobs", "Apple"));
            }
            other => panic!("expected grouped relations, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let response: ExtractionResponse = serde_json::from_str("{}").unwrap();
        assert!(response.is_empty());
    }
}
