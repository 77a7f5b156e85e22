//! Domain classification types and extraction schemas.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One label produced by the domain classifier for a text unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    /// Domain label (e.g. "technology").
    pub label: String,
    /// Classifier confidence, clamped to [0, 1].
    pub confidence: f32,
}

impl DomainClassification {
    /// Create a classification, clamping the confidence into [0, 1].
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: clamp_unit(confidence),
        }
    }
}

/// The combination of domains a text unit belongs to.
///
/// Labels are lowercased, sorted and de-duplicated on construction, so two
/// keys built from the same labels in any order compare equal and hash alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct DomainKey(Vec<String>);

impl DomainKey {
    /// Build a key from any collection of labels.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        labels.sort();
        labels.dedup();
        Self(labels)
    }

    /// Key containing a single domain.
    pub fn single(label: impl AsRef<str>) -> Self {
        Self::new([label])
    }

    /// The sorted labels in this key.
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Whether the key contains the given label.
    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for DomainKey {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl From<DomainKey> for Vec<String> {
    fn from(key: DomainKey) -> Self {
        key.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("+"))
    }
}

/// Entity and relation vocabulary handed to the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Entity types to extract, in preset order.
    pub entity_types: Vec<String>,
    /// Relation type to natural-language description.
    pub relation_types: BTreeMap<String, String>,
}

impl ExtractionSchema {
    /// Check if the schema has nothing to extract.
    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty() && self.relation_types.is_empty()
    }
}

/// Clamp a score into [0, 1]. NaN becomes 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
