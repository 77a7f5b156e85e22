//! Configuration system for canon.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CanonError, CanonResult};
use crate::traits::{EmbedderConfig, EmbedderProvider, LlmConfig, LlmProvider};

/// Domain classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Candidate domain labels offered to the classifier.
    pub domain_labels: Vec<String>,
    /// Minimum confidence for a label to count.
    pub threshold: f32,
    /// Maximum number of domains kept per unit.
    pub max_domains: usize,
    /// Domain used when nothing else matches.
    pub fallback_domain: String,
    /// Ask the classifier for multiple labels per unit.
    pub multi_label: bool,
    /// Use the keyword heuristic when the classifier fails or is absent.
    pub keyword_fallback: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            domain_labels: [
                "business",
                "technology",
                "ecommerce",
                "code",
                "documentation",
                "legal",
                "medical",
                "finance",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            threshold: 0.3,
            max_domains: 3,
            fallback_domain: "general".to_string(),
            multi_label: true,
            keyword_fallback: true,
        }
    }
}

/// Ingress filters applied to extracted mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Mentions below this confidence are dropped.
    pub min_confidence: f32,
    /// Mentions whose trimmed name is shorter than this (in chars) are dropped.
    pub min_name_length: usize,
    /// Regular expressions; a mention whose name matches any is dropped.
    pub exclude_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_name_length: 2,
            exclude_patterns: vec![r"^\d+$".to_string(), r"^[\p{P}\s]+$".to_string()],
        }
    }
}

/// Thresholds for the fuzzy → embedding → LLM cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Fuzzy similarity at or above which a pair merges.
    pub fuzzy_threshold: f32,
    /// Fuzzy similarity below which a pair is distinct.
    pub fuzzy_ambiguous_lower: f32,
    /// Embedding similarity at or above which a pair merges.
    pub embedding_threshold: f32,
    /// Embedding similarity below which a pair is distinct.
    pub embedding_ambiguous_lower: f32,
    /// Consult the LLM for pairs still ambiguous after embeddings.
    pub llm_enabled: bool,
    /// Maximum pairs per LLM resolution call.
    pub llm_batch_size: usize,
    /// Type partitions above this many names log a warning.
    pub large_partition_warning: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            fuzzy_ambiguous_lower: 0.75,
            embedding_threshold: 0.90,
            embedding_ambiguous_lower: 0.80,
            llm_enabled: true,
            llm_batch_size: 50,
            large_partition_warning: 2000,
        }
    }
}

/// Entity and relation vocabulary of one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetDefinition {
    pub entity_types: Vec<String>,
    /// Relation type to description.
    pub relation_types: BTreeMap<String, String>,
    /// Trigger words for the keyword classifier fallback.
    pub keywords: Vec<String>,
}

/// Connection settings for the NER service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerServiceConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NerServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8077".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            config: LlmConfig {
                model: "gpt-4.1-nano-2025-04-14".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Embedder provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderProviderConfig {
    /// Provider type.
    pub provider: EmbedderProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: EmbedderConfig,
}

impl Default for EmbedderProviderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::OpenAI,
            config: EmbedderConfig::default(),
        }
    }
}

/// Main pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scope for deterministic entity identifiers.
    pub project_id: String,
    /// Maximum domain groups extracted concurrently.
    pub max_concurrency: usize,
    /// Abort the run after this many seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
    pub classifier: ClassifierConfig,
    pub filter: FilterConfig,
    pub dedup: DedupConfig,
    /// User presets; override built-ins with the same name.
    pub presets: BTreeMap<String, PresetDefinition>,
    /// NER service (classification + extraction).
    pub ner: NerServiceConfig,
    /// LLM for ambiguous-pair resolution (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmProviderConfig>,
    /// Embedder for the embedding stage (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedder: Option<EmbedderProviderConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_id: "default".to_string(),
            max_concurrency: 4,
            run_timeout_secs: None,
            classifier: ClassifierConfig::default(),
            filter: FilterConfig::default(),
            dedup: DedupConfig::default(),
            presets: BTreeMap::new(),
            ner: NerServiceConfig::default(),
            llm: None,
            embedder: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> CanonResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| CanonError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| CanonError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| CanonError::Configuration(e.to_string()))?,
            _ => {
                return Err(CanonError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `CANON_*` environment variables onto this configuration.
    pub fn apply_env(&mut self) {
        if let Ok(project) = std::env::var("CANON_PROJECT_ID") {
            self.project_id = project;
        }
        if let Some(n) = env_parse::<usize>("CANON_MAX_CONCURRENCY") {
            self.max_concurrency = n;
        }
        if let Some(secs) = env_parse::<u64>("CANON_RUN_TIMEOUT_SECS") {
            self.run_timeout_secs = Some(secs);
        }
        if let Ok(labels) = std::env::var("CANON_DOMAIN_LABELS") {
            self.classifier.domain_labels = labels
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Some(t) = env_parse::<f32>("CANON_FUZZY_THRESHOLD") {
            self.dedup.fuzzy_threshold = t;
        }
        if let Some(t) = env_parse::<f32>("CANON_EMBEDDING_THRESHOLD") {
            self.dedup.embedding_threshold = t;
        }
        if let Some(t) = env_parse::<f32>("CANON_MIN_CONFIDENCE") {
            self.filter.min_confidence = t;
        }

        // NER service
        if let Ok(url) = std::env::var("CANON_NER_URL") {
            self.ner.base_url = url;
        }
        if let Ok(key) = std::env::var("CANON_NER_API_KEY") {
            self.ner.api_key = Some(key);
        }

        // LLM and embedder
        if let Ok(model) = std::env::var("CANON_LLM_MODEL") {
            self.llm.get_or_insert_with(LlmProviderConfig::default).config.model = model;
        }
        if let Ok(model) = std::env::var("CANON_EMBEDDER_MODEL") {
            self.embedder
                .get_or_insert_with(EmbedderProviderConfig::default)
                .config
                .model = model;
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if let Some(ref mut llm) = self.llm {
                llm.config.api_key.get_or_insert(api_key.clone());
            }
            if let Some(ref mut embedder) = self.embedder {
                embedder.config.api_key.get_or_insert(api_key);
            }
        }
    }

    /// Check ranges and orderings. Misconfiguration is the one error a run reports.
    pub fn validate(&self) -> CanonResult<()> {
        let unit = |field: &str, value: f32| -> CanonResult<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(CanonError::invalid_threshold(
                    field,
                    format!("{} must be within [0, 1], got {}", field, value),
                ))
            }
        };

        unit("classifier.threshold", self.classifier.threshold)?;
        unit("filter.min_confidence", self.filter.min_confidence)?;
        unit("dedup.fuzzy_threshold", self.dedup.fuzzy_threshold)?;
        unit("dedup.fuzzy_ambiguous_lower", self.dedup.fuzzy_ambiguous_lower)?;
        unit("dedup.embedding_threshold", self.dedup.embedding_threshold)?;
        unit("dedup.embedding_ambiguous_lower", self.dedup.embedding_ambiguous_lower)?;

        if self.dedup.fuzzy_ambiguous_lower > self.dedup.fuzzy_threshold {
            return Err(CanonError::invalid_threshold(
                "dedup.fuzzy_ambiguous_lower",
                "fuzzy_ambiguous_lower must not exceed fuzzy_threshold",
            ));
        }
        if self.dedup.embedding_ambiguous_lower > self.dedup.embedding_threshold {
            return Err(CanonError::invalid_threshold(
                "dedup.embedding_ambiguous_lower",
                "embedding_ambiguous_lower must not exceed embedding_threshold",
            ));
        }
        if self.dedup.llm_batch_size == 0 {
            return Err(CanonError::Configuration(
                "dedup.llm_batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedder.as_ref().is_some_and(|e| e.config.batch_size == 0) {
            return Err(CanonError::Configuration(
                "embedder.config.batch_size must be at least 1".to_string(),
            ));
        }
        if self.classifier.max_domains == 0 {
            return Err(CanonError::Configuration(
                "classifier.max_domains must be at least 1".to_string(),
            ));
        }
        if self.classifier.fallback_domain.trim().is_empty() {
            return Err(CanonError::Configuration(
                "classifier.fallback_domain must not be empty".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(CanonError::Configuration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.project_id.trim().is_empty() {
            return Err(CanonError::Configuration(
                "project_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable value for {}: {:?}", key, raw);
            None
        }
    }
}

/// Builder for PipelineConfig.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the project scope for entity identifiers.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.project_id = project_id.into();
        self
    }

    /// Set the number of concurrently extracted groups.
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    /// Set a deadline for the whole run.
    pub fn run_timeout_secs(mut self, secs: u64) -> Self {
        self.config.run_timeout_secs = Some(secs);
        self
    }

    /// Set classifier configuration.
    pub fn classifier(mut self, config: ClassifierConfig) -> Self {
        self.config.classifier = config;
        self
    }

    /// Set ingress filter configuration.
    pub fn filter(mut self, config: FilterConfig) -> Self {
        self.config.filter = config;
        self
    }

    /// Set deduplication configuration.
    pub fn dedup(mut self, config: DedupConfig) -> Self {
        self.config.dedup = config;
        self
    }

    /// Register a user preset.
    pub fn preset(mut self, name: impl Into<String>, preset: PresetDefinition) -> Self {
        self.config.presets.insert(name.into(), preset);
        self
    }

    /// Set NER service configuration.
    pub fn ner(mut self, config: NerServiceConfig) -> Self {
        self.config.ner = config;
        self
    }

    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = Some(config);
        self
    }

    /// Set embedder configuration.
    pub fn embedder(mut self, config: EmbedderProviderConfig) -> Self {
        self.config.embedder = Some(config);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> CanonResult<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
