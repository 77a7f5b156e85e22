//! Extraction client: one batched call per domain group, normalized output.

use std::sync::Arc;

use canon_core::traits::SchemaExtractor;
use canon_core::types::{
    DomainKey, EntityPayload, ExtractedEntity, ExtractedRelation, ExtractionResponse,
    ExtractionSchema, RelationPayload, Span,
};
use canon_core::{CanonError, CanonResult, FilterConfig};
use regex::Regex;

use crate::grouper::DomainGroup;

/// Mentions extracted from a single text unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitExtraction {
    pub entities: Vec<ExtractedEntity>,
    pub relations: Vec<ExtractedRelation>,
}

impl UnitExtraction {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// Outcome of extracting one domain group.
#[derive(Debug, Clone, Default)]
pub struct GroupExtraction {
    /// Index-aligned with the group's unit indices.
    pub units: Vec<UnitExtraction>,
    /// The extraction call failed; `units` are all empty.
    pub failed: bool,
}

/// Ingress filter for extracted entity mentions.
#[derive(Debug, Clone)]
pub struct EntityFilter {
    min_confidence: f32,
    min_name_length: usize,
    exclude: Vec<Regex>,
}

impl EntityFilter {
    /// Compile the filter; an invalid exclude pattern is a configuration error.
    pub fn new(config: &FilterConfig) -> CanonResult<Self> {
        let exclude = config
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    CanonError::Configuration(format!("Invalid exclude pattern '{}': {}", p, e))
                })
            })
            .collect::<CanonResult<Vec<_>>>()?;

        Ok(Self {
            min_confidence: config.min_confidence,
            min_name_length: config.min_name_length,
            exclude,
        })
    }

    /// Whether a mention survives the filter.
    pub fn accepts(&self, entity: &ExtractedEntity) -> bool {
        let name = entity.name.trim();

        if entity.confidence < self.min_confidence {
            tracing::debug!(
                "Dropping '{}' ({}): confidence {:.2} below {:.2}",
                name,
                entity.entity_type,
                entity.confidence,
                self.min_confidence
            );
            return false;
        }
        if name.chars().count() < self.min_name_length {
            tracing::debug!("Dropping '{}' ({}): name too short", name, entity.entity_type);
            return false;
        }
        if let Some(pattern) = self.exclude.iter().find(|p| p.is_match(name)) {
            tracing::debug!(
                "Dropping '{}' ({}): matches exclude pattern {}",
                name,
                entity.entity_type,
                pattern.as_str()
            );
            return false;
        }
        true
    }
}

/// Calls the schema extractor for a domain group and flattens its answers.
pub struct ExtractionClient {
    extractor: Arc<dyn SchemaExtractor>,
    filter: EntityFilter,
}

impl ExtractionClient {
    pub fn new(extractor: Arc<dyn SchemaExtractor>, filter: &FilterConfig) -> CanonResult<Self> {
        Ok(Self {
            extractor,
            filter: EntityFilter::new(filter)?,
        })
    }

    /// Extract all units of one group in a single call.
    ///
    /// `texts` holds the group's texts in `group.indices` order. Never fails:
    /// an extractor error or a response count mismatch is logged once and the
    /// group yields no mentions.
    pub async fn extract_group(
        &self,
        group: &DomainGroup,
        texts: &[String],
        schema: &ExtractionSchema,
    ) -> GroupExtraction {
        let empty = || GroupExtraction {
            units: vec![UnitExtraction::default(); group.indices.len()],
            failed: true,
        };

        let result = self
            .extractor
            .extract(texts, schema)
            .await
            .and_then(|responses| {
                if responses.len() == texts.len() {
                    Ok(responses)
                } else {
                    Err(CanonError::extraction(format!(
                        "returned {} responses for {} units",
                        responses.len(),
                        texts.len()
                    )))
                }
            });

        let responses = match result {
            Ok(responses) => responses,
            Err(e) => {
                tracing::warn!(
                    "Extraction failed for domain group '{}' ({} units) via '{}' [{}]: {}",
                    group.key,
                    group.len(),
                    self.extractor.name(),
                    e.code().as_str(),
                    e
                );
                return empty();
            }
        };

        let units = group
            .indices
            .iter()
            .zip(responses)
            .map(|(&unit_index, response)| {
                let mut unit = Self::normalize(response, unit_index, &group.key);
                unit.entities.retain(|e| self.filter.accepts(e));
                unit
            })
            .collect();

        GroupExtraction {
            units,
            failed: false,
        }
    }

    /// Flatten one response into mentions, stamping unit index and domains.
    ///
    /// Grouped payloads carry no confidence and are taken at 1.0. Entries with
    /// an empty name or type are skipped.
    pub fn normalize(
        response: ExtractionResponse,
        unit_index: usize,
        domains: &DomainKey,
    ) -> UnitExtraction {
        let mut entities = Vec::new();
        match response.entities {
            EntityPayload::Grouped(groups) => {
                for (entity_type, names) in groups {
                    for name in names {
                        let name = name.trim();
                        if name.is_empty() || entity_type.trim().is_empty() {
                            continue;
                        }
                        entities.push(
                            ExtractedEntity::new(name, entity_type.as_str(), unit_index)
                                .with_domains(domains.clone()),
                        );
                    }
                }
            }
            EntityPayload::Flat(items) => {
                for raw in items {
                    let name = raw.name.trim();
                    if name.is_empty() || raw.entity_type.trim().is_empty() {
                        continue;
                    }
                    let mut entity = ExtractedEntity::new(name, raw.entity_type.as_str(), unit_index)
                        .with_confidence(raw.confidence.unwrap_or(1.0))
                        .with_domains(domains.clone());
                    if let Some(span) = raw.start.zip(raw.end).and_then(|(s, e)| Span::new(s, e)) {
                        entity = entity.with_span(span);
                    }
                    entity.aliases = raw
                        .aliases
                        .into_iter()
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect();
                    entity.properties = raw.properties;
                    entities.push(entity);
                }
            }
        }

        let mut relations = Vec::new();
        match response.relations {
            RelationPayload::Grouped(groups) => {
                for (predicate, tuples) in groups {
                    for tuple in tuples {
                        let (subject, object) = tuple.endpoints();
                        if let Some(relation) =
                            Self::relation(subject, &predicate, object, 1.0, None, unit_index, domains)
                        {
                            relations.push(relation);
                        }
                    }
                }
            }
            RelationPayload::Flat(items) => {
                for raw in items {
                    let span = raw.start.zip(raw.end).and_then(|(s, e)| Span::new(s, e));
                    if let Some(relation) = Self::relation(
                        &raw.subject,
                        &raw.predicate,
                        &raw.object,
                        raw.confidence.unwrap_or(1.0),
                        span,
                        unit_index,
                        domains,
                    ) {
                        relations.push(relation);
                    }
                }
            }
        }

        UnitExtraction {
            entities,
            relations,
        }
    }

    fn relation(
        subject: &str,
        predicate: &str,
        object: &str,
        confidence: f32,
        span: Option<Span>,
        unit_index: usize,
        domains: &DomainKey,
    ) -> Option<ExtractedRelation> {
        let (subject, predicate, object) = (subject.trim(), predicate.trim(), object.trim());
        if subject.is_empty() || predicate.is_empty() || object.is_empty() {
            return None;
        }

        let mut relation = ExtractedRelation::new(subject, predicate, object, unit_index)
            .with_confidence(confidence)
            .with_domains(domains.clone());
        relation.span = span;
        Some(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticExtractor {
        json: &'static str,
        copies: usize,
    }

    #[async_trait]
    impl SchemaExtractor for StaticExtractor {
        async fn extract(
            &self,
            _texts: &[String],
            _schema: &ExtractionSchema,
        ) -> CanonResult<Vec<ExtractionResponse>> {
            let response: ExtractionResponse = serde_json::from_str(self.json)?;
            Ok(vec![response; self.copies])
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct DownExtractor;

    #[async_trait]
    impl SchemaExtractor for DownExtractor {
        async fn extract(
            &self,
            _texts: &[String],
            _schema: &ExtractionSchema,
        ) -> CanonResult<Vec<ExtractionResponse>> {
            Err(CanonError::network("connection refused"))
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn group(indices: Vec<usize>) -> DomainGroup {
        DomainGroup {
            key: DomainKey::new(["business", "technology"]),
            indices,
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[test]
    fn test_normalize_grouped_payload() {
        let response: ExtractionResponse = serde_json::from_str(
            r#"{
                "entities": {"person": ["Tim Cook", " "], "organization": ["Apple"]},
                "relation_extraction": {"works_for": [["Tim Cook", "Apple"]]}
            }"#,
        )
        .unwrap();

        let domains = DomainKey::single("business");
        let unit = ExtractionClient::normalize(response, 7, &domains);

        assert_eq!(unit.entities.len(), 2);
        assert!(unit.entities.iter().all(|e| e.confidence == 1.0));
        assert!(unit.entities.iter().all(|e| e.unit_index == 7));
        assert!(unit.entities.iter().all(|e| e.detected_domains == domains));
        assert_eq!(unit.relations.len(), 1);
        assert_eq!(unit.relations[0].predicate, "works_for");
        assert_eq!(unit.relations[0].object, "Apple");
    }

    #[test]
    fn test_normalize_flat_payload() {
        let response: ExtractionResponse = serde_json::from_str(
            r#"{
                "entities": [
                    {"text": "Rust", "label": "Programming_Language", "score": 0.92, "start": 4, "end": 8},
                    {"text": "Mozilla", "label": "organization", "score": 1.7}
                ],
                "relations": [
                    {"head": "Rust", "relation": "developed_by", "tail": "Mozilla", "score": 0.8}
                ]
            }"#,
        )
        .unwrap();

        let unit = ExtractionClient::normalize(response, 0, &DomainKey::single("technology"));

        assert_eq!(unit.entities[0].entity_type, "programming_language");
        assert_eq!(unit.entities[0].span, Span::new(4, 8));
        assert_eq!(unit.entities[1].confidence, 1.0);
        assert_eq!(unit.relations[0].confidence, 0.8);
    }

    #[test]
    fn test_filter_rules() {
        let filter = EntityFilter::new(&FilterConfig::default()).unwrap();

        assert!(filter.accepts(&ExtractedEntity::new("Apple", "organization", 0)));
        assert!(!filter.accepts(&ExtractedEntity::new("Apple", "organization", 0).with_confidence(0.2)));
        assert!(!filter.accepts(&ExtractedEntity::new("X", "organization", 0)));
        assert!(!filter.accepts(&ExtractedEntity::new("2024", "date", 0)));
        assert!(!filter.accepts(&ExtractedEntity::new("--", "concept", 0)));
    }

    #[test]
    fn test_invalid_exclude_pattern_is_rejected() {
        let config = FilterConfig {
            exclude_patterns: vec!["([".to_string()],
            ..Default::default()
        };
        let err = EntityFilter::new(&config).unwrap_err();
        assert!(matches!(err, CanonError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_extract_group_applies_filter() {
        let extractor = StaticExtractor {
            json: r#"{"entities": [
                {"text": "Apple", "label": "organization", "score": 0.9},
                {"text": "it", "label": "organization", "score": 0.3}
            ]}"#,
            copies: 2,
        };
        let client = ExtractionClient::new(Arc::new(extractor), &FilterConfig::default()).unwrap();

        let result = client
            .extract_group(&group(vec![1, 4]), &texts(2), &ExtractionSchema::default())
            .await;

        assert!(!result.failed);
        assert_eq!(result.units.len(), 2);
        assert_eq!(result.units[1].entities.len(), 1);
        assert_eq!(result.units[1].entities[0].unit_index, 4);
    }

    #[tokio::test]
    async fn test_extractor_failure_yields_empty_group() {
        let client = ExtractionClient::new(Arc::new(DownExtractor), &FilterConfig::default()).unwrap();

        let result = client
            .extract_group(&group(vec![0, 1, 2]), &texts(3), &ExtractionSchema::default())
            .await;

        assert!(result.failed);
        assert_eq!(result.units.len(), 3);
        assert!(result.units.iter().all(UnitExtraction::is_empty));
    }

    #[tokio::test]
    async fn test_response_count_mismatch_is_a_failure() {
        let extractor = StaticExtractor {
            json: r#"{"entities": {"person": ["Tim Cook"]}}"#,
            copies: 1,
        };
        let client = ExtractionClient::new(Arc::new(extractor), &FilterConfig::default()).unwrap();

        let result = client
            .extract_group(&group(vec![0, 1]), &texts(2), &ExtractionSchema::default())
            .await;

        assert!(result.failed);
    }
}
