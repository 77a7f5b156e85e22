//! Per-pair cascade decision.
//!
//! Stages run in order of cost and short-circuit on the first clear verdict:
//! fuzzy string similarity, embedding cosine similarity, then the LLM.

use canon_core::types::MatchStage;
use canon_core::DedupConfig;

/// Verdict for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Merge,
    Distinct,
    /// No clear verdict yet; the next stage should look at it.
    Ambiguous,
}

/// A verdict and the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub outcome: Outcome,
    pub stage: MatchStage,
    /// The score the verdict was based on (fuzzy or embedding similarity).
    pub similarity: f32,
}

/// Evidence gathered for one pair so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Similarities {
    pub fuzzy: f32,
    /// Cosine similarity of the name embeddings, when computed.
    pub embedding: Option<f32>,
    /// LLM verdict (`true` = same entity), when asked.
    pub llm: Option<bool>,
}

impl Similarities {
    pub fn fuzzy(score: f32) -> Self {
        Self {
            fuzzy: score,
            ..Default::default()
        }
    }

    pub fn with_embedding(mut self, score: f32) -> Self {
        self.embedding = Some(score);
        self
    }

    pub fn with_llm(mut self, same: bool) -> Self {
        self.llm = Some(same);
        self
    }

    /// The strongest numeric evidence available.
    pub fn best_score(&self) -> f32 {
        self.embedding.unwrap_or(self.fuzzy)
    }
}

/// Threshold bands of the cascade.
#[derive(Debug, Clone, Copy)]
pub struct PairDecider {
    fuzzy_threshold: f32,
    fuzzy_lower: f32,
    embedding_threshold: f32,
    embedding_lower: f32,
}

impl PairDecider {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            fuzzy_lower: config.fuzzy_ambiguous_lower,
            embedding_threshold: config.embedding_threshold,
            embedding_lower: config.embedding_ambiguous_lower,
        }
    }

    /// Decide a pair from the evidence gathered so far.
    ///
    /// Returns `Ambiguous` when the last stage with evidence falls inside its
    /// band; the caller either runs the next stage or treats it as distinct.
    pub fn decide(&self, s: &Similarities) -> Decision {
        if s.fuzzy >= self.fuzzy_threshold {
            return Decision {
                outcome: Outcome::Merge,
                stage: MatchStage::Fuzzy,
                similarity: s.fuzzy,
            };
        }
        if s.fuzzy < self.fuzzy_lower {
            return Decision {
                outcome: Outcome::Distinct,
                stage: MatchStage::Fuzzy,
                similarity: s.fuzzy,
            };
        }

        let mut stage = MatchStage::Fuzzy;
        if let Some(embedding) = s.embedding {
            stage = MatchStage::Embedding;
            if embedding >= self.embedding_threshold {
                return Decision {
                    outcome: Outcome::Merge,
                    stage,
                    similarity: embedding,
                };
            }
            if embedding < self.embedding_lower {
                return Decision {
                    outcome: Outcome::Distinct,
                    stage,
                    similarity: embedding,
                };
            }
        }

        match s.llm {
            Some(same) => Decision {
                outcome: if same { Outcome::Merge } else { Outcome::Distinct },
                stage: MatchStage::Llm,
                similarity: s.best_score(),
            },
            None => Decision {
                outcome: Outcome::Ambiguous,
                stage,
                similarity: s.best_score(),
            },
        }
    }
}

impl Default for PairDecider {
    fn default() -> Self {
        Self::new(&DedupConfig::default())
    }
}
