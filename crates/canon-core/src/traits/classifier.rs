//! Domain classifier trait.

use async_trait::async_trait;

use crate::error::CanonResult;
use crate::types::DomainClassification;

/// Multi-label text classifier used to route text units to domain presets.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify each text against `labels`.
    ///
    /// Returns one list per input text, in input order. Implementations may
    /// return labels below `threshold`; callers filter again.
    async fn classify(
        &self,
        texts: &[String],
        labels: &[String],
        threshold: f32,
        multi_label: bool,
    ) -> CanonResult<Vec<Vec<DomainClassification>>>;

    /// Human-readable name for this classifier.
    fn name(&self) -> &str;
}
