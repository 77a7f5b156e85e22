//! Domain classification of text units.
//!
//! The injected [`Classifier`] is asked first. When it fails, or reports
//! nothing above threshold for a unit, a keyword heuristic built from the
//! preset trigger words takes over; when that also finds nothing the unit
//! falls back to the configured domain. Every unit gets at least one domain.

use std::collections::HashSet;
use std::sync::Arc;

use canon_core::traits::Classifier;
use canon_core::types::{DomainClassification, DomainKey};
use canon_core::{CanonError, CanonResult, ClassifierConfig};
use regex::Regex;

use crate::presets::PresetMerger;

/// Trigger-word matcher for one domain.
#[derive(Debug, Clone)]
struct KeywordRule {
    domain: String,
    pattern: Regex,
}

/// Assigns a [`DomainKey`] to every text unit.
pub struct DomainClassifier {
    classifier: Option<Arc<dyn Classifier>>,
    config: ClassifierConfig,
    rules: Vec<KeywordRule>,
}

impl DomainClassifier {
    /// Create a classifier.
    ///
    /// Keyword rules are compiled for every label in the configured vocabulary
    /// that has trigger words in `presets`.
    pub fn new(
        classifier: Option<Arc<dyn Classifier>>,
        config: ClassifierConfig,
        presets: &PresetMerger,
    ) -> CanonResult<Self> {
        let mut rules = Vec::new();

        for label in vocabulary(&config) {
            let Some(preset) = presets.get(&label) else {
                continue;
            };
            let words: Vec<String> = preset
                .keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(regex::escape)
                .collect();
            if words.is_empty() {
                continue;
            }

            let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).map_err(|e| {
                CanonError::Configuration(format!("Invalid keywords for domain '{}': {}", label, e))
            })?;
            rules.push(KeywordRule {
                domain: label,
                pattern,
            });
        }

        Ok(Self {
            classifier,
            config,
            rules,
        })
    }

    /// Classify a batch of texts; the result is index-aligned with `texts`.
    ///
    /// Never fails. A classifier error is logged once and every unit goes
    /// through the keyword heuristic.
    pub async fn classify_units(&self, texts: &[String]) -> Vec<DomainKey> {
        if texts.is_empty() {
            return Vec::new();
        }

        let model_labels = self.classify_with_model(texts).await;

        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let from_model = model_labels
                    .as_ref()
                    .and_then(|all| all.get(i))
                    .map(|labels| self.select_labels(labels))
                    .unwrap_or_default();

                if !from_model.is_empty() {
                    return from_model;
                }

                let from_keywords = if self.config.keyword_fallback {
                    self.keyword_domains(text)
                } else {
                    DomainKey::default()
                };
                if !from_keywords.is_empty() {
                    tracing::debug!("Unit {} classified by keywords as {}", i, from_keywords);
                    return from_keywords;
                }

                DomainKey::single(&self.config.fallback_domain)
            })
            .collect()
    }

    async fn classify_with_model(&self, texts: &[String]) -> Option<Vec<Vec<DomainClassification>>> {
        let classifier = self.classifier.as_ref()?;

        let result = classifier
            .classify(
                texts,
                &self.config.domain_labels,
                self.config.threshold,
                self.config.multi_label,
            )
            .await
            .and_then(|labels| {
                if labels.len() == texts.len() {
                    Ok(labels)
                } else {
                    Err(CanonError::classification(format!(
                        "returned {} results for {} texts",
                        labels.len(),
                        texts.len()
                    )))
                }
            });

        match result {
            Ok(labels) => Some(labels),
            Err(e) => {
                tracing::warn!(
                    "Classifier '{}' failed, using keyword fallback [{}]: {}",
                    classifier.name(),
                    e.code().as_str(),
                    e
                );
                None
            }
        }
    }

    /// Keep in-vocabulary labels at or above threshold, best first, capped.
    fn select_labels(&self, labels: &[DomainClassification]) -> DomainKey {
        let allowed: HashSet<String> = vocabulary(&self.config).into_iter().collect();

        let mut kept: Vec<(String, f32)> = labels
            .iter()
            .map(|c| (c.label.trim().to_lowercase(), c.confidence))
            .filter(|(label, confidence)| {
                allowed.contains(label) && *confidence >= self.config.threshold
            })
            .collect();
        kept.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        kept.truncate(self.max_domains());

        DomainKey::new(kept.into_iter().map(|(label, _)| label))
    }

    /// Domains whose trigger words occur in `text`, ranked by hit count.
    pub fn keyword_domains(&self, text: &str) -> DomainKey {
        let mut hits: Vec<(&str, usize)> = self
            .rules
            .iter()
            .map(|rule| (rule.domain.as_str(), rule.pattern.find_iter(text).count()))
            .filter(|(_, count)| *count > 0)
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hits.truncate(self.max_domains());

        DomainKey::new(hits.into_iter().map(|(domain, _)| domain))
    }

    fn max_domains(&self) -> usize {
        if self.config.multi_label {
            self.config.max_domains.max(1)
        } else {
            1
        }
    }
}

fn vocabulary(config: &ClassifierConfig) -> Vec<String> {
    config
        .domain_labels
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedClassifier {
        labels: Vec<Vec<DomainClassification>>,
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _texts: &[String],
            _labels: &[String],
            _threshold: f32,
            _multi_label: bool,
        ) -> CanonResult<Vec<Vec<DomainClassification>>> {
            Ok(self.labels.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn classify(
            &self,
            _texts: &[String],
            _labels: &[String],
            _threshold: f32,
            _multi_label: bool,
        ) -> CanonResult<Vec<Vec<DomainClassification>>> {
            Err(CanonError::classification("service unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn build(classifier: Option<Arc<dyn Classifier>>) -> DomainClassifier {
        DomainClassifier::new(classifier, ClassifierConfig::default(), &PresetMerger::builtin())
            .unwrap()
    }

    #[tokio::test]
    async fn test_threshold_and_cap() {
        let classifier = FixedClassifier {
            labels: vec![vec![
                DomainClassification::new("legal", 0.2),
                DomainClassification::new("Technology", 0.9),
                DomainClassification::new("business", 0.7),
                DomainClassification::new("finance", 0.5),
                DomainClassification::new("code", 0.4),
                DomainClassification::new("astrology", 0.99),
            ]],
        };
        let domains = build(Some(Arc::new(classifier)))
            .classify_units(&texts(&["anything"]))
            .await;

        assert_eq!(domains, vec![DomainKey::new(["business", "finance", "technology"])]);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_keywords() {
        let domains = build(Some(Arc::new(FailingClassifier)))
            .classify_units(&texts(&[
                "The patient received a new drug as treatment.",
                "Nothing to see here.",
            ]))
            .await;

        assert_eq!(domains[0], DomainKey::single("medical"));
        assert_eq!(domains[1], DomainKey::single("general"));
    }

    #[tokio::test]
    async fn test_empty_model_result_uses_keywords() {
        let classifier = FixedClassifier {
            labels: vec![vec![DomainClassification::new("legal", 0.1)]],
        };
        let domains = build(Some(Arc::new(classifier)))
            .classify_units(&texts(&["Refactor this function and the module import."]))
            .await;

        assert_eq!(domains, vec![DomainKey::single("code")]);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_treated_as_failure() {
        let classifier = FixedClassifier { labels: vec![] };
        let domains = build(Some(Arc::new(classifier)))
            .classify_units(&texts(&["a contract clause"]))
            .await;

        assert_eq!(domains, vec![DomainKey::single("legal")]);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let classifier = build(None);
        // "drugstore" must not trigger "drug".
        assert!(classifier.keyword_domains("a drugstore on main street").is_empty());
        assert_eq!(
            classifier.keyword_domains("Our CLOUD platform exposes an API"),
            DomainKey::single("technology")
        );
    }

    #[tokio::test]
    async fn test_no_classifier_and_no_fallback() {
        let config = ClassifierConfig {
            keyword_fallback: false,
            fallback_domain: "documentation".to_string(),
            ..Default::default()
        };
        let classifier = DomainClassifier::new(None, config, &PresetMerger::builtin()).unwrap();
        let domains = classifier.classify_units(&texts(&["cloud api platform"])).await;

        assert_eq!(domains, vec![DomainKey::single("documentation")]);
    }
}
