//! End-to-end tests of the entity pipeline with in-process providers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use canon_core::traits::{Classifier, Embedder, Llm, LlmResponse, Prompt, SchemaExtractor};
use canon_core::types::{
    DomainClassification, EdgeKind, ExtractionResponse, ExtractionSchema, GraphNode,
    IngestionGraph, MatchStage, TextUnit,
};
use canon_core::{CanonError, CanonResult, DedupConfig, PipelineConfig};
use canon_entities::EntityPipeline;
use serde_json::json;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Returns fixed labels per text.
struct MockClassifier {
    labels: HashMap<String, Vec<(&'static str, f32)>>,
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        texts: &[String],
        _labels: &[String],
        _threshold: f32,
        _multi_label: bool,
    ) -> CanonResult<Vec<Vec<DomainClassification>>> {
        Ok(texts
            .iter()
            .map(|t| {
                self.labels
                    .get(t)
                    .map(|ls| {
                        ls.iter()
                            .map(|(l, c)| DomainClassification::new(*l, *c))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Answers from a text → response table and records every call.
struct MockExtractor {
    responses: HashMap<String, ExtractionResponse>,
    calls: Mutex<Vec<(usize, ExtractionSchema)>>,
}

impl MockExtractor {
    fn new(entries: Vec<(&str, serde_json::Value)>) -> Self {
        Self {
            responses: entries
                .into_iter()
                .map(|(text, value)| (text.to_string(), serde_json::from_value(value).unwrap()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SchemaExtractor for MockExtractor {
    async fn extract(
        &self,
        texts: &[String],
        schema: &ExtractionSchema,
    ) -> CanonResult<Vec<ExtractionResponse>> {
        self.calls.lock().unwrap().push((texts.len(), schema.clone()));
        Ok(texts
            .iter()
            .map(|t| self.responses.get(t).cloned().unwrap_or_default())
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct UnreachableExtractor;

#[async_trait]
impl SchemaExtractor for UnreachableExtractor {
    async fn extract(
        &self,
        _texts: &[String],
        _schema: &ExtractionSchema,
    ) -> CanonResult<Vec<ExtractionResponse>> {
        Err(CanonError::network("connection refused"))
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

struct SlowExtractor;

#[async_trait]
impl SchemaExtractor for SlowExtractor {
    async fn extract(
        &self,
        texts: &[String],
        _schema: &ExtractionSchema,
    ) -> CanonResult<Vec<ExtractionResponse>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![ExtractionResponse::default(); texts.len()])
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Fixed vectors per name; unknown names embed to zero.
struct MockEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn new(entries: Vec<(&str, Vec<f32>)>) -> Self {
        Self {
            vectors: entries
                .into_iter()
                .map(|(name, v)| (name.to_string(), v))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_names(&self, names: &[String]) -> CanonResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(names
            .iter()
            .map(|name| self.vectors.get(name).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
            .collect())
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}

/// Replies with the same content to every prompt.
struct MockLlm {
    reply: CanonResult<String>,
    calls: AtomicUsize,
}

impl MockLlm {
    fn replying(content: &str) -> Self {
        Self {
            reply: Ok(content.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(CanonError::llm("model overloaded")),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete(&self, _prompt: &Prompt) -> CanonResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(content) => Ok(LlmResponse::text(content.clone())),
            Err(e) => Err(CanonError::llm(e.to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn units(texts: &[&str]) -> Vec<TextUnit> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| TextUnit::new(format!("chunk-{}", i), *t))
        .collect()
}

/// Unit vector at `degrees` from the x axis.
fn at_angle(degrees: f32) -> Vec<f32> {
    let radians = degrees.to_radians();
    vec![radians.cos(), radians.sin()]
}

/// Everything fuzzy-ambiguous, so pairs reach the later stages.
fn ambiguous_fuzzy_config() -> PipelineConfig {
    PipelineConfig {
        dedup: DedupConfig {
            fuzzy_threshold: 0.99,
            fuzzy_ambiguous_lower: 0.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_name_variants_collapse_to_one_entity() {
    let extractor = MockExtractor::new(vec![
        ("Tim Cook leads Apple.", json!({"entities": {"person": ["Tim Cook"]}})),
        ("Timothy Cook spoke today.", json!({"entities": {"person": ["Timothy Cook"]}})),
        ("An interview with tim cook.", json!({"entities": {"person": ["tim cook"]}})),
    ]);

    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .extractor(Arc::new(extractor))
        .build()
        .unwrap();

    let output = pipeline
        .run(&units(&[
            "Tim Cook leads Apple.",
            "Timothy Cook spoke today.",
            "An interview with tim cook.",
        ]))
        .await
        .unwrap();

    assert_eq!(output.delta.nodes.len(), 1);
    let node = &output.delta.nodes[0];
    assert_eq!(node.name, "Tim Cook");
    assert_eq!(node.entity_type, "person");
    assert_eq!(node.mention_count, 3);
    assert!(node.aliases.contains("Timothy Cook"));
    assert_eq!(output.delta.count_edges(EdgeKind::Mentions), 3);
    assert_eq!(output.stats.entities_extracted, 3);
    assert_eq!(output.stats.duplicates_removed, 1);
    assert_eq!(output.duplicates[0].stage, MatchStage::Fuzzy);
}

#[tokio::test]
async fn test_embedding_stage_merges_ambiguous_pair() {
    let extractor = MockExtractor::new(vec![
        ("Facebook grew.", json!({"entities": {"organization": ["Facebook"]}})),
        ("Meta Platforms reported.", json!({"entities": {"organization": ["Meta Platforms"]}})),
    ]);
    let embedder = Arc::new(MockEmbedder::new(vec![
        ("Facebook", vec![1.0, 0.0]),
        ("Meta Platforms", vec![0.93, (1.0f32 - 0.93 * 0.93).sqrt()]),
    ]));

    let pipeline = EntityPipeline::builder(ambiguous_fuzzy_config())
        .extractor(Arc::new(extractor))
        .embedder(embedder.clone())
        .build()
        .unwrap();

    let output = pipeline
        .run(&units(&["Facebook grew.", "Meta Platforms reported."]))
        .await
        .unwrap();

    assert_eq!(output.delta.nodes.len(), 1);
    assert_eq!(output.duplicates.len(), 1);
    assert_eq!(output.duplicates[0].stage, MatchStage::Embedding);
    assert!((output.duplicates[0].similarity - 0.93).abs() < 1e-3);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert!(output.delta.nodes[0].embedding.is_some());
}

#[tokio::test]
async fn test_domain_order_does_not_split_groups() {
    let classifier = MockClassifier {
        labels: HashMap::from([
            (
                "Apple ships a new chip.".to_string(),
                vec![("technology", 0.9), ("business", 0.8)],
            ),
            (
                "Apple stock rises on chip news.".to_string(),
                vec![("business", 0.9), ("technology", 0.8)],
            ),
        ]),
    };
    let extractor = Arc::new(MockExtractor::new(vec![]));

    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .classifier(Arc::new(classifier))
        .extractor(extractor.clone())
        .build()
        .unwrap();

    let output = pipeline
        .run(&units(&["Apple ships a new chip.", "Apple stock rises on chip news."]))
        .await
        .unwrap();

    assert_eq!(output.stats.groups, 1);
    assert_eq!(extractor.call_count(), 1);

    let calls = extractor.calls.lock().unwrap();
    let (batch_size, schema) = &calls[0];
    assert_eq!(*batch_size, 2);
    assert!(schema.relation_types.contains_key("ceo_of"));
    assert!(schema.relation_types.contains_key("built_with"));
}

#[tokio::test]
async fn test_unreachable_extractor_leaves_graph_unchanged() {
    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .extractor(Arc::new(UnreachableExtractor))
        .build()
        .unwrap();

    let mut graph = IngestionGraph::new();
    graph.nodes.push(GraphNode {
        id: "chunk-0".to_string(),
        label: "Chunk".to_string(),
        properties: Default::default(),
    });
    let before = graph.clone();

    let stats = pipeline
        .transform(&mut graph, &units(&["Tim Cook leads Apple."]))
        .await
        .unwrap();

    assert_eq!(graph, before);
    assert_eq!(stats.failed_groups, 1);
    assert_eq!(stats.entities_extracted, 0);
}

#[tokio::test]
async fn test_same_name_different_type_never_merges() {
    let extractor = MockExtractor::new(vec![(
        "Apple sells the apple.",
        json!({"entities": {"organization": ["Apple"], "product": ["apple"]}}),
    )]);

    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .extractor(Arc::new(extractor))
        .build()
        .unwrap();

    let output = pipeline.run(&units(&["Apple sells the apple."])).await.unwrap();

    assert_eq!(output.delta.nodes.len(), 2);
    assert!(output.delta.find("Apple", "organization").is_some());
    assert!(output.delta.find("apple", "product").is_some());
    assert!(output.duplicates.is_empty());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_merges_are_transitive() {
    let extractor = MockExtractor::new(vec![(
        "three names",
        json!({"entities": {"organization": ["Alpha", "Beta", "Gamma"]}}),
    )]);
    // Alpha~Beta and Beta~Gamma clear the embedding threshold; Alpha~Gamma does not.
    let embedder = MockEmbedder::new(vec![
        ("Alpha", at_angle(0.0)),
        ("Beta", at_angle(20.0)),
        ("Gamma", at_angle(40.0)),
    ]);

    let pipeline = EntityPipeline::builder(ambiguous_fuzzy_config())
        .extractor(Arc::new(extractor))
        .embedder(Arc::new(embedder))
        .build()
        .unwrap();

    let output = pipeline.run(&units(&["three names"])).await.unwrap();

    assert_eq!(output.duplicates.len(), 2);
    assert_eq!(output.delta.nodes.len(), 1);
    assert_eq!(output.delta.nodes[0].mention_count, 3);
}

#[tokio::test]
async fn test_llm_resolves_remaining_pairs() {
    let extractor = MockExtractor::new(vec![(
        "two names",
        json!({"entities": {"organization": ["Alphabet", "Google"]}}),
    )]);
    // Cosine ~0.85: inside the embedding band.
    let embedder = MockEmbedder::new(vec![
        ("Alphabet", at_angle(0.0)),
        ("Google", at_angle(31.8)),
    ]);
    let llm = Arc::new(MockLlm::replying(r#"{"verdicts": [{"pair": 0, "same": true}]}"#));

    let pipeline = EntityPipeline::builder(ambiguous_fuzzy_config())
        .extractor(Arc::new(extractor))
        .embedder(Arc::new(embedder))
        .llm(llm.clone())
        .build()
        .unwrap();

    let output = pipeline.run(&units(&["two names"])).await.unwrap();

    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.delta.nodes.len(), 1);
    assert_eq!(output.duplicates[0].stage, MatchStage::Llm);
}

#[tokio::test]
async fn test_llm_failure_means_distinct() {
    let extractor = MockExtractor::new(vec![(
        "two names",
        json!({"entities": {"organization": ["Alphabet", "Google"]}}),
    )]);
    let llm = Arc::new(MockLlm::failing());

    let pipeline = EntityPipeline::builder(ambiguous_fuzzy_config())
        .extractor(Arc::new(extractor))
        .llm(llm.clone())
        .build()
        .unwrap();

    let output = pipeline.run(&units(&["two names"])).await.unwrap();

    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.delta.nodes.len(), 2);
    assert!(output.duplicates.is_empty());
}

#[tokio::test]
async fn test_llm_disabled_is_not_called() {
    let extractor = MockExtractor::new(vec![(
        "two names",
        json!({"entities": {"organization": ["Alphabet", "Google"]}}),
    )]);
    let llm = Arc::new(MockLlm::replying(r#"{"verdicts": [{"pair": 0, "same": true}]}"#));

    let mut config = ambiguous_fuzzy_config();
    config.dedup.llm_enabled = false;

    let pipeline = EntityPipeline::builder(config)
        .extractor(Arc::new(extractor))
        .llm(llm.clone())
        .build()
        .unwrap();

    let output = pipeline.run(&units(&["two names"])).await.unwrap();

    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    assert_eq!(output.delta.nodes.len(), 2);
}

#[tokio::test]
async fn test_runs_are_reproducible() {
    let entries = vec![
        (
            "Tim Cook runs Apple Inc.",
            json!({
                "entities": {"person": ["Tim Cook"], "organization": ["Apple Inc."]},
                "relation_extraction": {"works_for": [["Tim Cook", "Apple Inc."]]}
            }),
        ),
        (
            "Apple hired Timothy Cook.",
            json!({
                "entities": [
                    {"text": "Apple", "label": "organization", "score": 0.95},
                    {"text": "Timothy Cook", "label": "person", "score": 0.9}
                ],
                "relations": [{"head": "Timothy Cook", "relation": "works_for", "tail": "Apple"}]
            }),
        ),
    ];
    let texts = ["Tim Cook runs Apple Inc.", "Apple hired Timothy Cook."];

    let mut deltas = Vec::new();
    for _ in 0..2 {
        let pipeline = EntityPipeline::builder(PipelineConfig::default())
            .extractor(Arc::new(MockExtractor::new(entries.clone())))
            .build()
            .unwrap();
        deltas.push(pipeline.run(&units(&texts)).await.unwrap().delta);
    }

    assert_eq!(deltas[0], deltas[1]);
    assert_eq!(deltas[0].nodes.len(), 2);
    assert_eq!(deltas[0].count_edges(EdgeKind::Relation), 1);
    assert_eq!(deltas[0].count_edges(EdgeKind::Mentions), 4);
}

#[tokio::test]
async fn test_transform_merges_delta_into_graph() {
    let extractor = MockExtractor::new(vec![(
        "Tim Cook runs Apple.",
        json!({
            "entities": {"person": ["Tim Cook"], "organization": ["Apple"]},
            "relation_extraction": {"ceo_of": [["Tim Cook", "Apple"]]}
        }),
    )]);

    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .extractor(Arc::new(extractor))
        .build()
        .unwrap();

    let mut graph = IngestionGraph::new();
    let input = units(&["Tim Cook runs Apple."]);
    pipeline.transform(&mut graph, &input).await.unwrap();
    pipeline.transform(&mut graph, &input).await.unwrap();

    // Same canonical identities across runs land on the same nodes and edges.
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.relationships.len(), 3);
    assert!(graph.nodes.iter().all(|n| n.label == "Entity"));

    pipeline.close();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancelled_run_leaves_graph_untouched() {
    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .extractor(Arc::new(SlowExtractor))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut graph = IngestionGraph::new();
    let err = pipeline
        .transform_with_cancel(&mut graph, &units(&["anything"]), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, CanonError::Cancelled));
    assert!(graph.nodes.is_empty());
}

#[tokio::test]
async fn test_run_timeout() {
    let config = PipelineConfig {
        run_timeout_secs: Some(1),
        ..Default::default()
    };
    let pipeline = EntityPipeline::builder(config)
        .extractor(Arc::new(SlowExtractor))
        .build()
        .unwrap();

    let err = pipeline.run(&units(&["anything"])).await.unwrap_err();
    assert!(matches!(err, CanonError::Timeout { seconds: 1 }));
}

#[tokio::test]
async fn test_build_requires_extractor() {
    let result = EntityPipeline::builder(PipelineConfig::default()).build();
    assert!(matches!(result, Err(CanonError::Configuration(_))));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = PipelineConfig::default();
    config.dedup.fuzzy_ambiguous_lower = 0.95;

    let result = EntityPipeline::builder(config)
        .extractor(Arc::new(UnreachableExtractor))
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_empty_batch() {
    let extractor = Arc::new(MockExtractor::new(vec![]));
    let pipeline = EntityPipeline::builder(PipelineConfig::default())
        .extractor(extractor.clone())
        .build()
        .unwrap();

    let output = pipeline.run(&[]).await.unwrap();
    assert!(output.delta.is_empty());
    assert_eq!(extractor.call_count(), 0);
}
