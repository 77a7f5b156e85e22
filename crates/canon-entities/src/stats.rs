//! Run statistics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::extraction::UnitExtraction;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Entity mentions that survived the ingress filter.
    pub entities_extracted: usize,
    pub relations_extracted: usize,
    pub duplicates_removed: usize,
    /// Surviving mentions per entity type.
    pub entity_type_histogram: BTreeMap<String, usize>,
    /// Domain groups extracted.
    pub groups: usize,
    /// Domain groups whose extraction call failed.
    pub failed_groups: usize,
    pub canonical_entities: usize,
}

impl RunStats {
    /// Count mentions from per-unit extractions.
    pub(crate) fn record_extractions(&mut self, extractions: &[UnitExtraction]) {
        for unit in extractions {
            self.entities_extracted += unit.entities.len();
            self.relations_extracted += unit.relations.len();
            for entity in &unit.entities {
                *self
                    .entity_type_histogram
                    .entry(entity.entity_type.clone())
                    .or_default() += 1;
            }
        }
    }
}

/// Totals across the lifetime of a pipeline handle.
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    runs: AtomicUsize,
    units: AtomicUsize,
    canonical_entities: AtomicUsize,
    failed_groups: AtomicUsize,
}

impl PipelineCounters {
    pub(crate) fn record(&self, units: usize, stats: &RunStats) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.units.fetch_add(units, Ordering::Relaxed);
        self.canonical_entities
            .fetch_add(stats.canonical_entities, Ordering::Relaxed);
        self.failed_groups
            .fetch_add(stats.failed_groups, Ordering::Relaxed);
    }

    pub(crate) fn log_summary(&self) {
        tracing::info!(
            "Entity pipeline closed after {} runs: {} units, {} canonical entities, {} failed groups",
            self.runs.load(Ordering::Relaxed),
            self.units.load(Ordering::Relaxed),
            self.canonical_entities.load(Ordering::Relaxed),
            self.failed_groups.load(Ordering::Relaxed)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_core::types::{ExtractedEntity, ExtractedRelation};

    #[test]
    fn test_record_extractions() {
        let extractions = vec![
            UnitExtraction {
                entities: vec![
                    ExtractedEntity::new("Tim Cook", "person", 0),
                    ExtractedEntity::new("Apple", "organization", 0),
                ],
                relations: vec![ExtractedRelation::new("Tim Cook", "works_for", "Apple", 0)],
            },
            UnitExtraction {
                entities: vec![ExtractedEntity::new("Satya Nadella", "person", 1)],
                relations: vec![],
            },
        ];

        let mut stats = RunStats::default();
        stats.record_extractions(&extractions);

        assert_eq!(stats.entities_extracted, 3);
        assert_eq!(stats.relations_extracted, 1);
        assert_eq!(stats.entity_type_histogram["person"], 2);
        assert_eq!(stats.entity_type_histogram["organization"], 1);
    }
}
