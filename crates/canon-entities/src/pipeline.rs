//! The entity pipeline service handle.
//!
//! text units → domain classification → grouping → per-group schema merge and
//! extraction → deduplication → canonical graph delta.

use std::sync::Arc;
use std::time::Duration;

use canon_core::traits::{Classifier, Embedder, Llm, SchemaExtractor};
use canon_core::types::{EntityGraphDelta, ExtractedEntity, IngestionGraph, TextUnit};
use canon_core::{CanonError, CanonResult, PipelineConfig};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::builder::CanonicalGraphBuilder;
use crate::classifier::DomainClassifier;
use crate::dedup::{Deduplicator, DuplicatePair};
use crate::extraction::{ExtractionClient, GroupExtraction, UnitExtraction};
use crate::grouper::BatchGrouper;
use crate::presets::PresetMerger;
use crate::stats::{PipelineCounters, RunStats};

/// Result of one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub delta: EntityGraphDelta,
    pub stats: RunStats,
    /// Merge decisions that shaped the delta.
    pub duplicates: Vec<DuplicatePair>,
}

/// Builder for [`EntityPipeline`].
pub struct EntityPipelineBuilder {
    config: PipelineConfig,
    classifier: Option<Arc<dyn Classifier>>,
    extractor: Option<Arc<dyn SchemaExtractor>>,
    embedder: Option<Arc<dyn Embedder>>,
    llm: Option<Arc<dyn Llm>>,
}

impl EntityPipelineBuilder {
    /// Domain classifier; without one every unit uses the keyword heuristic.
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Schema extractor (required).
    pub fn extractor(mut self, extractor: Arc<dyn SchemaExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Embedder for the embedding stage of deduplication.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// LLM for resolving pairs still ambiguous after embeddings.
    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn build(self) -> CanonResult<EntityPipeline> {
        self.config.validate()?;

        let extractor = self.extractor.ok_or_else(|| {
            CanonError::Configuration("Entity pipeline requires a schema extractor".to_string())
        })?;

        let presets = PresetMerger::new(&self.config.presets);
        let classifier =
            DomainClassifier::new(self.classifier, self.config.classifier.clone(), &presets)?;
        let extraction = ExtractionClient::new(extractor, &self.config.filter)?;

        let mut deduplicator = Deduplicator::new(self.config.dedup.clone());
        if let Some(embedder) = self.embedder {
            deduplicator = deduplicator.with_embedder(embedder);
        }
        if let Some(llm) = self.llm {
            deduplicator = deduplicator.with_llm(llm);
        }

        Ok(EntityPipeline {
            builder: CanonicalGraphBuilder::new(&self.config.project_id),
            config: self.config,
            classifier,
            presets,
            extraction,
            deduplicator,
            counters: PipelineCounters::default(),
        })
    }
}

/// Entity extraction and deduplication for one project.
///
/// Holds its providers; create once, run per ingestion batch, then `close`.
pub struct EntityPipeline {
    config: PipelineConfig,
    classifier: DomainClassifier,
    presets: PresetMerger,
    extraction: ExtractionClient,
    deduplicator: Deduplicator,
    builder: CanonicalGraphBuilder,
    counters: PipelineCounters,
}

impl EntityPipeline {
    pub fn builder(config: PipelineConfig) -> EntityPipelineBuilder {
        EntityPipelineBuilder {
            config,
            classifier: None,
            extractor: None,
            embedder: None,
            llm: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a batch of units and return the delta without applying it.
    pub async fn run(&self, units: &[TextUnit]) -> CanonResult<PipelineOutput> {
        self.run_with_cancel(units, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), aborting with `Cancelled` when `cancel` fires
    /// and with `Timeout` after `run_timeout_secs`.
    pub async fn run_with_cancel(
        &self,
        units: &[TextUnit],
        cancel: &CancellationToken,
    ) -> CanonResult<PipelineOutput> {
        let guarded = async {
            match self.config.run_timeout_secs {
                Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), self.execute(units))
                    .await
                    .map_err(|_| CanonError::Timeout { seconds }),
                None => Ok(self.execute(units).await),
            }
        };

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("Entity pipeline run cancelled ({} units)", units.len());
                return Err(CanonError::Cancelled);
            }
            result = guarded => result?,
        };

        self.counters.record(units.len(), &output.stats);
        Ok(output)
    }

    /// Process a batch and merge the result into the caller's graph.
    pub async fn transform(
        &self,
        graph: &mut IngestionGraph,
        units: &[TextUnit],
    ) -> CanonResult<RunStats> {
        self.transform_with_cancel(graph, units, CancellationToken::new())
            .await
    }

    /// Like [`transform`](Self::transform); on cancellation or timeout the
    /// graph is left untouched.
    pub async fn transform_with_cancel(
        &self,
        graph: &mut IngestionGraph,
        units: &[TextUnit],
        cancel: CancellationToken,
    ) -> CanonResult<RunStats> {
        let output = self.run_with_cancel(units, &cancel).await?;
        graph.apply(&output.delta);
        Ok(output.stats)
    }

    /// Release the pipeline and log lifetime counters.
    pub fn close(self) {
        self.counters.log_summary();
    }

    async fn execute(&self, units: &[TextUnit]) -> PipelineOutput {
        if units.is_empty() {
            return PipelineOutput::default();
        }

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();

        let keys = self.classifier.classify_units(&texts).await;
        let groups = BatchGrouper::group(&keys);
        tracing::debug!(
            "Classified {} units into {} domain groups",
            units.len(),
            groups.len()
        );

        let tasks = groups.iter().enumerate().map(|(position, group)| {
            let group_texts: Vec<String> = group.indices.iter().map(|&i| texts[i].clone()).collect();
            let schema = self.presets.merge(&group.key);
            async move {
                let result = self.extraction.extract_group(group, &group_texts, &schema).await;
                (position, result)
            }
        });

        let mut results: Vec<(usize, GroupExtraction)> = stream::iter(tasks)
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(position, _)| *position);

        let failed_groups = results.iter().filter(|(_, r)| r.failed).count();
        let per_group: Vec<Vec<UnitExtraction>> = results.into_iter().map(|(_, r)| r.units).collect();
        let extractions = BatchGrouper::scatter(&groups, per_group, units.len());

        let entities: Vec<ExtractedEntity> = extractions
            .iter()
            .flat_map(|u| u.entities.iter().cloned())
            .collect();

        let dedup = self.deduplicator.deduplicate(&entities).await;
        let delta = self.builder.build(units, &extractions, &dedup);

        let mut stats = RunStats {
            duplicates_removed: dedup.stats.duplicates_removed,
            groups: groups.len(),
            failed_groups,
            canonical_entities: delta.nodes.len(),
            ..Default::default()
        };
        stats.record_extractions(&extractions);

        tracing::info!(
            "Entity pipeline: {} units, {} groups ({} failed), {} mentions, {} canonical entities, {} duplicates removed",
            units.len(),
            stats.groups,
            stats.failed_groups,
            stats.entities_extracted,
            stats.canonical_entities,
            stats.duplicates_removed
        );

        PipelineOutput {
            delta,
            stats,
            duplicates: dedup.pairs,
        }
    }
}
