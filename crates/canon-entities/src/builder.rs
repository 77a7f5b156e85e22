//! Builds canonical entity nodes and their edges from deduplicated mentions.

use std::collections::{HashMap, HashSet};

use canon_core::types::{
    CanonicalEntity, EntityGraphDelta, ExtractedEntity, GraphRelationship, TextUnit,
};
use uuid::Uuid;

use crate::dedup::DedupResult;
use crate::extraction::UnitExtraction;
use crate::normalize::normalize_name;

/// Resolved mentions grouped by normalized name, in the order seen.
#[derive(Debug, Default)]
struct EndpointIndex<'a> {
    by_name: HashMap<String, Vec<(&'a str, &'a str)>>,
}

impl<'a> EndpointIndex<'a> {
    fn insert(&mut self, normalized: String, entity: &'a ExtractedEntity) {
        self.by_name
            .entry(normalized)
            .or_default()
            .push((entity.name.trim(), entity.entity_type.as_str()));
    }

    /// Type of the mention whose surface form matches exactly, else of the
    /// first mention with this normalized name.
    fn entity_type(&self, normalized: &str, surface: &str) -> Option<&'a str> {
        let candidates = self.by_name.get(normalized)?;
        candidates
            .iter()
            .find(|(name, _)| *name == surface)
            .or_else(|| candidates.first())
            .map(|(_, entity_type)| *entity_type)
    }
}

/// Applies a canonical mapping to raw mentions.
#[derive(Debug, Clone)]
pub struct CanonicalGraphBuilder {
    project_id: String,
}

impl CanonicalGraphBuilder {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    /// Build the delta. `extractions` is index-aligned with `units`.
    pub fn build(
        &self,
        units: &[TextUnit],
        extractions: &[UnitExtraction],
        dedup: &DedupResult,
    ) -> EntityGraphDelta {
        let mut nodes: Vec<CanonicalEntity> = Vec::new();
        let mut node_index: HashMap<(String, String), usize> = HashMap::new();
        let mut relationships = Vec::new();
        let mut mention_edges: HashSet<(usize, Uuid)> = HashSet::new();

        let mut batch_index = EndpointIndex::default();
        let mut unit_indices: Vec<EndpointIndex> = Vec::with_capacity(extractions.len());

        for (unit_index, (unit, extraction)) in units.iter().zip(extractions).enumerate() {
            let mut unit_endpoints = EndpointIndex::default();
            for entity in &extraction.entities {
                let normalized = normalize_name(&entity.name);
                let Some(canonical) = dedup.mapping.get(&entity.entity_type, &normalized) else {
                    continue;
                };
                unit_endpoints.insert(normalized.clone(), entity);
                batch_index.insert(normalized, entity);

                let key = (entity.entity_type.clone(), canonical.normalized_name.clone());
                let slot = *node_index.entry(key).or_insert_with(|| {
                    nodes.push(CanonicalEntity::new(
                        &self.project_id,
                        canonical.name.as_str(),
                        canonical.normalized_name.as_str(),
                        entity.entity_type.as_str(),
                    ));
                    nodes.len() - 1
                });
                let node = &mut nodes[slot];

                node.mention_count += 1;
                let surface = entity.name.trim();
                if surface != node.name {
                    node.aliases.insert(surface.to_string());
                }
                for alias in &entity.aliases {
                    if alias != &node.name {
                        node.aliases.insert(alias.clone());
                    }
                }
                for (key, value) in &entity.properties {
                    node.properties
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                if node.embedding.is_none() {
                    node.embedding = dedup.embeddings.get(&node.normalized_name).cloned();
                }

                if mention_edges.insert((unit_index, node.uuid)) {
                    relationships.push(GraphRelationship::mentions(unit.id.clone(), node.uuid));
                }
            }
            unit_indices.push(unit_endpoints);
        }

        let mut relation_edges: HashMap<(Uuid, String, Uuid), usize> = HashMap::new();
        let mut dropped = 0usize;

        for (extraction, unit_endpoints) in extractions.iter().zip(&unit_indices) {
            let endpoint = |name: &str| -> Option<Uuid> {
                let normalized = normalize_name(name);
                let surface = name.trim();
                let entity_type = unit_endpoints
                    .entity_type(&normalized, surface)
                    .or_else(|| batch_index.entity_type(&normalized, surface))?;
                let canonical = dedup.mapping.get(entity_type, &normalized)?;
                let slot = node_index.get(&(
                    entity_type.to_string(),
                    canonical.normalized_name.clone(),
                ))?;
                Some(nodes[*slot].uuid)
            };

            for relation in &extraction.relations {
                let (Some(subject), Some(object)) =
                    (endpoint(&relation.subject), endpoint(&relation.object))
                else {
                    dropped += 1;
                    continue;
                };
                if subject == object {
                    dropped += 1;
                    continue;
                }

                let key = (subject, relation.predicate.clone(), object);
                match relation_edges.get(&key) {
                    Some(&i) => {
                        let edge: &mut GraphRelationship = &mut relationships[i];
                        if edge.confidence.map_or(true, |c| relation.confidence > c) {
                            edge.confidence = Some(relation.confidence);
                        }
                    }
                    None => {
                        relation_edges.insert(key, relationships.len());
                        relationships.push(GraphRelationship::relation(
                            subject,
                            relation.predicate.as_str(),
                            object,
                            relation.confidence,
                        ));
                    }
                }
            }
        }

        if dropped > 0 {
            tracing::debug!("Dropped {} relations with unresolved endpoints", dropped);
        }

        EntityGraphDelta {
            nodes,
            relationships,
        }
    }
}
