//! HTTP client for the NER service.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use canon_core::config::NerServiceConfig;
use canon_core::error::{CanonError, CanonResult};
use canon_core::traits::{Classifier, SchemaExtractor};
use canon_core::types::{DomainClassification, ExtractionResponse, ExtractionSchema};

/// Client for a schema-driven NER/classification service.
pub struct NerServiceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    texts: &'a [String],
    labels: &'a [String],
    threshold: f32,
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(alias = "classifications")]
    results: Vec<Vec<LabelScore>>,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    #[serde(alias = "score")]
    confidence: f32,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    texts: &'a [String],
    entity_types: &'a [String],
    relation_types: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(alias = "extractions")]
    results: Vec<ExtractionResponse>,
}

impl NerServiceClient {
    /// Create a client from the `[ner]` config section.
    ///
    /// `NER_API_KEY` is used when the config carries no key.
    pub fn new(config: &NerServiceConfig) -> CanonResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(CanonError::Configuration(
                "NER service base_url must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| CanonError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("NER_API_KEY").ok());

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> CanonResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CanonError::network(format!("Failed to call NER service at {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CanonError::from_http_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| CanonError::parse(format!("Failed to parse NER response: {}", e)))
    }
}

#[async_trait]
impl Classifier for NerServiceClient {
    async fn classify(
        &self,
        texts: &[String],
        labels: &[String],
        threshold: f32,
        multi_label: bool,
    ) -> CanonResult<Vec<Vec<DomainClassification>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = ClassifyRequest {
            texts,
            labels,
            threshold,
            multi_label,
        };
        let response: ClassifyResponse = self.post("classify", &request).await?;

        tracing::debug!("Classified {} texts against {} labels", texts.len(), labels.len());

        Ok(response
            .results
            .into_iter()
            .map(|scores| {
                scores
                    .into_iter()
                    .map(|s| DomainClassification::new(s.label, s.confidence))
                    .collect()
            })
            .collect())
    }

    fn name(&self) -> &str {
        "ner-service"
    }
}

#[async_trait]
impl SchemaExtractor for NerServiceClient {
    async fn extract(
        &self,
        texts: &[String],
        schema: &ExtractionSchema,
    ) -> CanonResult<Vec<ExtractionResponse>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = ExtractRequest {
            texts,
            entity_types: &schema.entity_types,
            relation_types: &schema.relation_types,
        };
        let response: ExtractResponse = self.post("extract", &request).await?;

        tracing::debug!(
            "Extracted {} responses for {} texts ({} entity types)",
            response.results.len(),
            texts.len(),
            schema.entity_types.len()
        );

        Ok(response.results)
    }

    fn name(&self) -> &str {
        "ner-service"
    }
}
