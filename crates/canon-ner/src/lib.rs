//! canon-ner - Client for a schema-driven NER service.
//!
//! The service exposes two JSON endpoints:
//!
//! - `POST {base}/classify` - multi-label domain classification
//! - `POST {base}/extract` - entity and relation extraction scoped by a schema
//!
//! [`NerServiceClient`] implements both [`Classifier`](canon_core::Classifier)
//! and [`SchemaExtractor`](canon_core::SchemaExtractor), so one client can be
//! handed to the pipeline builder twice.

mod client;

pub use client::NerServiceClient;
