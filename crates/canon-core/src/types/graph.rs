//! Canonical entities and the graph delta handed back to the caller.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Namespace for deterministic entity identifiers.
const ENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_8d3b_4c7a_9e15_b0d2_47a8_c3e9);

/// Node label used for canonical entities in the caller's graph.
pub const ENTITY_LABEL: &str = "Entity";

/// The deduplicated representative of one or more raw mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub uuid: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub entity_type: String,
    /// Every other surface form seen for this entity.
    pub aliases: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub mention_count: usize,
}

impl CanonicalEntity {
    /// Create an entity with no mentions yet.
    pub fn new(
        project_id: &str,
        name: impl Into<String>,
        normalized_name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        let normalized_name = normalized_name.into();
        let entity_type = entity_type.into();
        Self {
            uuid: Self::derive_uuid(project_id, &normalized_name, &entity_type),
            name: name.into(),
            normalized_name,
            entity_type,
            aliases: BTreeSet::new(),
            properties: BTreeMap::new(),
            embedding: None,
            mention_count: 0,
        }
    }

    /// Deterministic identifier for (project, normalized canonical name, type).
    pub fn derive_uuid(project_id: &str, normalized_name: &str, entity_type: &str) -> Uuid {
        let key = format!("{}\u{1f}{}\u{1f}{}", project_id, entity_type, normalized_name);
        Uuid::new_v5(&ENTITY_NAMESPACE, key.as_bytes())
    }

    /// Project this entity into a generic graph node.
    pub fn to_node(&self) -> GraphNode {
        let mut properties = self.properties.clone();
        properties.insert("name".to_string(), self.name.clone().into());
        properties.insert("normalized_name".to_string(), self.normalized_name.clone().into());
        properties.insert("entity_type".to_string(), self.entity_type.clone().into());
        properties.insert(
            "aliases".to_string(),
            serde_json::Value::Array(self.aliases.iter().cloned().map(Into::into).collect()),
        );
        properties.insert("mention_count".to_string(), self.mention_count.into());
        if let Some(ref embedding) = self.embedding {
            properties.insert(
                "embedding".to_string(),
                serde_json::Value::Array(embedding.iter().map(|v| (*v as f64).into()).collect()),
            );
        }

        GraphNode {
            id: self.uuid.to_string(),
            label: ENTITY_LABEL.to_string(),
            properties,
        }
    }
}

/// Edge kinds emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Source unit → entity.
    Mentions,
    /// Entity → entity, typed by predicate.
    Relation,
}

/// A directed edge in the caller's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub kind: EdgeKind,
    /// Source node id (text unit id for MENTIONS, entity uuid for RELATION).
    pub source: String,
    /// Target node id (entity uuid).
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl GraphRelationship {
    /// Create a MENTIONS edge from a source unit to an entity.
    pub fn mentions(unit_id: impl Into<String>, entity: Uuid) -> Self {
        Self {
            kind: EdgeKind::Mentions,
            source: unit_id.into(),
            target: entity.to_string(),
            predicate: None,
            confidence: None,
        }
    }

    /// Create a RELATION edge between two entities.
    pub fn relation(subject: Uuid, predicate: impl Into<String>, object: Uuid, confidence: f32) -> Self {
        Self {
            kind: EdgeKind::Relation,
            source: subject.to_string(),
            target: object.to_string(),
            predicate: Some(predicate.into()),
            confidence: Some(confidence),
        }
    }
}

/// Nodes and edges produced by one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityGraphDelta {
    pub nodes: Vec<CanonicalEntity>,
    pub relationships: Vec<GraphRelationship>,
}

impl EntityGraphDelta {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Count edges of a given kind.
    pub fn count_edges(&self, kind: EdgeKind) -> usize {
        self.relationships.iter().filter(|r| r.kind == kind).count()
    }

    /// Find a node by canonical name and type.
    pub fn find(&self, name: &str, entity_type: &str) -> Option<&CanonicalEntity> {
        self.nodes
            .iter()
            .find(|n| n.name == name && n.entity_type == entity_type)
    }
}

/// A generic node in the caller's in-flight ingestion graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// The caller's in-flight graph, persisted after the pipeline returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionGraph {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

impl IngestionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a delta into this graph.
    ///
    /// A node already present (same id) keeps its name and properties; the
    /// delta adds its aliases, its name if different, and its mention count,
    /// plus any property the node lacks. Edges already present are not
    /// duplicated.
    pub fn apply(&mut self, delta: &EntityGraphDelta) {
        for entity in &delta.nodes {
            let node = entity.to_node();
            match self.nodes.iter_mut().find(|n| n.id == node.id) {
                Some(existing) => merge_node(existing, node),
                None => self.nodes.push(node),
            }
        }

        let mut seen: HashSet<(EdgeKind, String, String, Option<String>)> = self
            .relationships
            .iter()
            .map(|r| (r.kind, r.source.clone(), r.target.clone(), r.predicate.clone()))
            .collect();
        for rel in &delta.relationships {
            let key = (rel.kind, rel.source.clone(), rel.target.clone(), rel.predicate.clone());
            if seen.insert(key) {
                self.relationships.push(rel.clone());
            }
        }
    }
}

fn merge_node(existing: &mut GraphNode, incoming: GraphNode) {
    let name = existing
        .properties
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut aliases = string_set(existing.properties.get("aliases"));
    aliases.extend(string_set(incoming.properties.get("aliases")));
    if let Some(incoming_name) = incoming.properties.get("name").and_then(|v| v.as_str()) {
        aliases.insert(incoming_name.to_string());
    }
    if let Some(ref name) = name {
        aliases.remove(name);
    }

    let mentions = mention_count(existing) + mention_count(&incoming);

    for (key, value) in incoming.properties {
        existing.properties.entry(key).or_insert(value);
    }
    existing.properties.insert(
        "aliases".to_string(),
        serde_json::Value::Array(aliases.into_iter().map(Into::into).collect()),
    );
    existing
        .properties
        .insert("mention_count".to_string(), mentions.into());
}

fn string_set(value: Option<&serde_json::Value>) -> BTreeSet<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn mention_count(node: &GraphNode) -> u64 {
    node.properties
        .get("mention_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_is_deterministic_and_scoped() {
        let a = CanonicalEntity::derive_uuid("proj", "tim cook", "person");
        let b = CanonicalEntity::derive_uuid("proj", "tim cook", "person");
        let other_type = CanonicalEntity::derive_uuid("proj", "tim cook", "organization");
        let other_project = CanonicalEntity::derive_uuid("other", "tim cook", "person");

        assert_eq!(a, b);
        assert_ne!(a, other_type);
        assert_ne!(a, other_project);
    }

    #[test]
    fn test_apply_deduplicates_edges() {
        let mut entity = CanonicalEntity::new("proj", "Apple", "apple", "organization");
        entity.mention_count = 2;
        let delta = EntityGraphDelta {
            relationships: vec![GraphRelationship::mentions("chunk-1", entity.uuid)],
            nodes: vec![entity],
        };

        let mut graph = IngestionGraph::new();
        graph.apply(&delta);
        graph.apply(&delta);

        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.nodes[0].label, ENTITY_LABEL);
        assert_eq!(graph.nodes[0].properties["mention_count"], serde_json::json!(4));
    }

    #[test]
    fn test_apply_merges_existing_node() {
        let mut first = CanonicalEntity::new("proj", "Apple Inc.", "apple", "organization");
        first.mention_count = 2;
        first.aliases.insert("Apple".to_string());
        first
            .properties
            .insert("ticker".to_string(), serde_json::json!("AAPL"));

        let mut second = CanonicalEntity::new("proj", "APPLE", "apple", "organization");
        second.mention_count = 1;
        second.aliases.insert("Apple Computer".to_string());
        second
            .properties
            .insert("ticker".to_string(), serde_json::json!("XXXX"));
        second
            .properties
            .insert("hq".to_string(), serde_json::json!("Cupertino"));
        assert_eq!(first.uuid, second.uuid);

        let mut graph = IngestionGraph::new();
        graph.apply(&EntityGraphDelta {
            nodes: vec![first],
            relationships: Vec::new(),
        });
        graph.apply(&EntityGraphDelta {
            nodes: vec![second],
            relationships: Vec::new(),
        });

        assert_eq!(graph.nodes.len(), 1);
        let props = &graph.nodes[0].properties;
        assert_eq!(props["name"], serde_json::json!("Apple Inc."));
        assert_eq!(props["mention_count"], serde_json::json!(3));
        assert_eq!(
            props["aliases"],
            serde_json::json!(["APPLE", "Apple", "Apple Computer"])
        );
        assert_eq!(props["ticker"], serde_json::json!("AAPL"));
        assert_eq!(props["hq"], serde_json::json!("Cupertino"));
    }

    #[test]
    fn test_edge_kind_strings() {
        assert_eq!(EdgeKind::Mentions.to_string(), "MENTIONS");
        assert_eq!(
            serde_json::to_string(&EdgeKind::Relation).unwrap(),
            "\"RELATION\""
        );
    }
}
