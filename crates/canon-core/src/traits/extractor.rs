//! Schema-driven entity/relation extraction trait.

use async_trait::async_trait;

use crate::error::CanonResult;
use crate::types::{ExtractionResponse, ExtractionSchema};

/// External NER/relation-extraction function, scoped by a schema per call.
#[async_trait]
pub trait SchemaExtractor: Send + Sync {
    /// Extract entities and relations from a batch of texts sharing one schema.
    ///
    /// Must return exactly one response per input text, in input order.
    async fn extract(
        &self,
        texts: &[String],
        schema: &ExtractionSchema,
    ) -> CanonResult<Vec<ExtractionResponse>>;

    /// Human-readable name for this extractor.
    fn name(&self) -> &str;
}
