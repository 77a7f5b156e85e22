//! Hybrid deduplication of extracted entities.
//!
//! Mentions are reduced to identities keyed by `(entity_type, normalized_name)`
//! and compared pairwise within each type partition through a cascade:
//!
//! 1. Fuzzy string similarity (always)
//! 2. Embedding cosine similarity (ambiguous pairs, when an embedder is set)
//! 3. Batched LLM verdicts (still ambiguous, when an LLM is set and enabled)
//!
//! Merges feed a union-find, so classes are transitive. Pairs left without a
//! verdict are distinct.

mod decide;
mod embedding;
mod fuzzy;
mod llm;

pub use decide::{Decision, Outcome, PairDecider, Similarities};
pub use embedding::EmbeddingScorer;
pub use fuzzy::similarity as fuzzy_similarity;
pub use llm::{LlmResolver, PairQuestion};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use canon_core::traits::{Embedder, Llm};
use canon_core::types::{ExtractedEntity, MatchStage};
use canon_core::DedupConfig;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_name;

/// Canonical name an identity resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalName {
    /// Surface form of the representative.
    pub name: String,
    pub normalized_name: String,
}

/// `(entity_type, normalized_name)` → canonical name, for one run.
#[derive(Debug, Clone, Default)]
pub struct CanonicalMapping {
    entries: HashMap<(String, String), CanonicalName>,
}

impl CanonicalMapping {
    /// Look up by type and already-normalized name.
    pub fn get(&self, entity_type: &str, normalized_name: &str) -> Option<&CanonicalName> {
        self.entries
            .get(&(entity_type.to_string(), normalized_name.to_string()))
    }

    /// Look up by type and raw surface name.
    pub fn resolve(&self, entity_type: &str, name: &str) -> Option<&CanonicalName> {
        self.get(entity_type, &normalize_name(name))
    }

    /// Number of identities mapped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, entity_type: &str, normalized_name: &str, canonical: CanonicalName) {
        self.entries
            .insert((entity_type.to_string(), normalized_name.to_string()), canonical);
    }
}

/// A merge decision between two identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub entity_type: String,
    /// Normalized names of the two identities.
    pub a: String,
    pub b: String,
    pub similarity: f32,
    pub stage: MatchStage,
}

/// Counts for one deduplication run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Distinct `(type, normalized name)` identities.
    pub entities_before: usize,
    /// Canonical classes.
    pub entities_after: usize,
    pub duplicates_removed: usize,
}

/// Everything a deduplication run produces.
#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    pub mapping: CanonicalMapping,
    pub pairs: Vec<DuplicatePair>,
    pub stats: DedupStats,
    /// Name embeddings computed along the way, by normalized name.
    pub embeddings: HashMap<String, Vec<f32>>,
}

#[derive(Debug)]
struct Identity {
    entity_type: String,
    normalized: String,
    /// Longest surface form seen; the earliest wins among equal lengths.
    surface: String,
    mention_count: usize,
    first_seen: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    a: usize,
    b: usize,
    evidence: Similarities,
}

/// Runs the fuzzy → embedding → LLM cascade over a batch of mentions.
pub struct Deduplicator {
    config: DedupConfig,
    decider: PairDecider,
    embedder: Option<Arc<dyn Embedder>>,
    llm: Option<Arc<dyn Llm>>,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            decider: PairDecider::new(&config),
            config,
            embedder: None,
            llm: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Deduplicate one batch of mentions. Never fails; provider errors
    /// degrade to "distinct".
    pub async fn deduplicate(&self, entities: &[ExtractedEntity]) -> DedupResult {
        let identities = collect_identities(entities);

        let mut partitions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, identity) in identities.iter().enumerate() {
            partitions
                .entry(identity.entity_type.as_str())
                .or_default()
                .push(i);
        }

        let mut union = UnionFind::<usize>::new(identities.len());
        let mut pairs = Vec::new();
        let mut pending = Vec::new();

        // Stage 1: fuzzy
        for (entity_type, members) in &partitions {
            if members.len() > self.config.large_partition_warning {
                tracing::warn!(
                    "Entity type '{}' has {} distinct names; pairwise comparison is quadratic",
                    entity_type,
                    members.len()
                );
            }
            for (x, &a) in members.iter().enumerate() {
                for &b in &members[x + 1..] {
                    let score = fuzzy::similarity(&identities[a].normalized, &identities[b].normalized);
                    let candidate = Candidate {
                        a,
                        b,
                        evidence: Similarities::fuzzy(score),
                    };
                    if let Some(open) = self.settle(candidate, &identities, &mut union, &mut pairs) {
                        pending.push(open);
                    }
                }
            }
        }

        // Stage 2: embeddings
        let mut embeddings = HashMap::new();
        if !pending.is_empty() {
            if let Some(ref embedder) = self.embedder {
                let mut scorer = EmbeddingScorer::new(embedder.clone());
                let names: Vec<(String, String)> = pending
                    .iter()
                    .flat_map(|c| [c.a, c.b])
                    .map(|i| (identities[i].normalized.clone(), identities[i].surface.clone()))
                    .collect();

                match scorer.prepare(&names).await {
                    Ok(()) => {
                        let mut still_open = Vec::new();
                        for mut candidate in pending {
                            if let Some(score) = scorer.score(
                                &identities[candidate.a].normalized,
                                &identities[candidate.b].normalized,
                            ) {
                                candidate.evidence = candidate.evidence.with_embedding(score);
                            }
                            if let Some(open) =
                                self.settle(candidate, &identities, &mut union, &mut pairs)
                            {
                                still_open.push(open);
                            }
                        }
                        pending = still_open;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Embedding stage failed for {} ambiguous pairs: {}",
                            pending.len(),
                            e
                        );
                    }
                }
                embeddings = scorer.into_embeddings();
            }
        }

        // Stage 3: LLM
        if !pending.is_empty() {
            match self.llm {
                Some(ref llm) if self.config.llm_enabled => {
                    let resolver = LlmResolver::new(llm.clone(), self.config.llm_batch_size);
                    let questions: Vec<PairQuestion> = pending
                        .iter()
                        .map(|c| PairQuestion {
                            entity_type: identities[c.a].entity_type.clone(),
                            a: identities[c.a].surface.clone(),
                            b: identities[c.b].surface.clone(),
                        })
                        .collect();

                    let verdicts = resolver.resolve(&questions).await;
                    let mut unanswered = 0;
                    for (mut candidate, verdict) in pending.into_iter().zip(verdicts) {
                        if let Some(same) = verdict {
                            candidate.evidence = candidate.evidence.with_llm(same);
                        }
                        if self
                            .settle(candidate, &identities, &mut union, &mut pairs)
                            .is_some()
                        {
                            unanswered += 1;
                        }
                    }
                    if unanswered > 0 {
                        tracing::debug!("{} pairs without LLM verdict treated as distinct", unanswered);
                    }
                }
                _ => {
                    tracing::debug!("{} ambiguous pairs treated as distinct", pending.len());
                }
            }
        }

        let mapping = build_mapping(&identities, &union);
        let entities_after = count_classes(&identities, &union);
        let stats = DedupStats {
            entities_before: identities.len(),
            entities_after,
            duplicates_removed: identities.len() - entities_after,
        };

        tracing::info!(
            "Deduplicated {} identities into {} ({} merges)",
            stats.entities_before,
            stats.entities_after,
            pairs.len()
        );

        DedupResult {
            mapping,
            pairs,
            stats,
            embeddings,
        }
    }

    /// Apply the decider; merges are recorded, ambiguous pairs handed back.
    fn settle(
        &self,
        candidate: Candidate,
        identities: &[Identity],
        union: &mut UnionFind<usize>,
        pairs: &mut Vec<DuplicatePair>,
    ) -> Option<Candidate> {
        let decision = self.decider.decide(&candidate.evidence);
        let (a, b) = (&identities[candidate.a], &identities[candidate.b]);

        match decision.outcome {
            Outcome::Merge => {
                tracing::debug!(
                    "Merging '{}' and '{}' ({}) at {} stage, similarity {:.3}",
                    a.normalized,
                    b.normalized,
                    a.entity_type,
                    decision.stage,
                    decision.similarity
                );
                union.union(candidate.a, candidate.b);
                pairs.push(DuplicatePair {
                    entity_type: a.entity_type.clone(),
                    a: a.normalized.clone(),
                    b: b.normalized.clone(),
                    similarity: decision.similarity,
                    stage: decision.stage,
                });
                None
            }
            Outcome::Distinct => None,
            Outcome::Ambiguous => Some(candidate),
        }
    }
}

fn collect_identities(entities: &[ExtractedEntity]) -> Vec<Identity> {
    let mut identities: Vec<Identity> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for entity in entities {
        let normalized = normalize_name(&entity.name);
        if normalized.is_empty() {
            continue;
        }
        let surface = entity.name.trim();
        let key = (entity.entity_type.clone(), normalized);

        match index.get(&key) {
            Some(&i) => {
                let identity = &mut identities[i];
                identity.mention_count += 1;
                if surface.chars().count() > identity.surface.chars().count() {
                    identity.surface = surface.to_string();
                }
            }
            None => {
                let first_seen = identities.len();
                index.insert(key.clone(), first_seen);
                identities.push(Identity {
                    entity_type: key.0,
                    normalized: key.1,
                    surface: surface.to_string(),
                    mention_count: 1,
                    first_seen,
                });
            }
        }
    }

    identities
}

/// Pick each class representative: most mentions, then longest surface form,
/// then first seen.
fn build_mapping(identities: &[Identity], union: &UnionFind<usize>) -> CanonicalMapping {
    let mut representative: HashMap<usize, usize> = HashMap::new();
    for (i, identity) in identities.iter().enumerate() {
        let root = union.find(i);
        let best = representative.entry(root).or_insert(i);
        let current = &identities[*best];
        let better = identity
            .mention_count
            .cmp(&current.mention_count)
            .then(
                identity
                    .surface
                    .chars()
                    .count()
                    .cmp(&current.surface.chars().count()),
            )
            .then(current.first_seen.cmp(&identity.first_seen))
            .is_gt();
        if better {
            *best = i;
        }
    }

    let mut mapping = CanonicalMapping::default();
    for (i, identity) in identities.iter().enumerate() {
        let rep = &identities[representative[&union.find(i)]];
        mapping.insert(
            &identity.entity_type,
            &identity.normalized,
            CanonicalName {
                name: rep.surface.clone(),
                normalized_name: rep.normalized.clone(),
            },
        );
    }
    mapping
}

fn count_classes(identities: &[Identity], union: &UnionFind<usize>) -> usize {
    let mut roots: Vec<usize> = (0..identities.len()).map(|i| union.find(i)).collect();
    roots.sort_unstable();
    roots.dedup();
    roots.len()
}
