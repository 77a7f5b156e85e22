//! LLM stage: batched identical/distinct verdicts for ambiguous pairs.

use std::sync::Arc;

use canon_core::traits::{Llm, Prompt};
use canon_core::CanonResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// One pair shown to the LLM.
#[derive(Debug, Clone)]
pub struct PairQuestion {
    pub entity_type: String,
    pub a: String,
    pub b: String,
}

/// Asks an LLM whether ambiguous name pairs refer to the same entity.
pub struct LlmResolver {
    llm: Arc<dyn Llm>,
    batch_size: usize,
}

impl LlmResolver {
    pub fn new(llm: Arc<dyn Llm>, batch_size: usize) -> Self {
        Self {
            llm,
            batch_size: batch_size.max(1),
        }
    }

    /// Verdicts index-aligned with `pairs`: `Some(true)` same entity,
    /// `Some(false)` different, `None` no usable answer.
    ///
    /// Never fails; a failed batch leaves its pairs without a verdict.
    pub async fn resolve(&self, pairs: &[PairQuestion]) -> Vec<Option<bool>> {
        let mut verdicts = Vec::with_capacity(pairs.len());

        for (batch_no, batch) in pairs.chunks(self.batch_size).enumerate() {
            match self.resolve_batch(batch).await {
                Ok(batch_verdicts) => verdicts.extend(batch_verdicts),
                Err(e) => {
                    tracing::warn!(
                        "LLM resolution failed for batch {} ({} pairs), treating as distinct: {}",
                        batch_no,
                        batch.len(),
                        e
                    );
                    verdicts.extend(std::iter::repeat(None).take(batch.len()));
                }
            }
        }

        verdicts
    }

    async fn resolve_batch(&self, batch: &[PairQuestion]) -> CanonResult<Vec<Option<bool>>> {
        let prompt = Prompt::new(RESOLVER_SYSTEM_PROMPT, Self::build_prompt(batch)).json();
        let response = self.llm.complete(&prompt).await?;
        Ok(Self::parse_response(response.content_or_empty(), batch.len()))
    }

    fn build_prompt(batch: &[PairQuestion]) -> String {
        let mut prompt = String::from("PAIRS:\n");
        for (i, pair) in batch.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] ({}) \"{}\" vs \"{}\"\n",
                i, pair.entity_type, pair.a, pair.b
            ));
        }
        prompt.push_str("\nRespond with a single JSON object.");
        prompt
    }

    /// Parse verdicts; anything unreadable or missing becomes `None`.
    fn parse_response(content: &str, expected: usize) -> Vec<Option<bool>> {
        let mut verdicts = vec![None; expected];

        let json_str = extract_json(content.trim());
        let parsed: Option<RawVerdicts> = serde_json::from_str(json_str)
            .ok()
            .or_else(|| lenient_parse(json_str));
        let Some(parsed) = parsed else {
            if !content.trim().is_empty() {
                tracing::warn!("Could not parse LLM dedup response");
            }
            return verdicts;
        };

        for verdict in parsed.verdicts {
            let Some(slot) = verdicts.get_mut(verdict.pair) else {
                tracing::debug!("LLM verdict for unknown pair index {}", verdict.pair);
                continue;
            };
            *slot = verdict.same();
        }

        verdicts
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdicts {
    #[serde(default, alias = "results", alias = "pairs")]
    verdicts: Vec<RawVerdict>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(alias = "index", alias = "id")]
    pair: usize,
    #[serde(default, alias = "identical", alias = "duplicate")]
    same: Option<bool>,
    #[serde(default, alias = "decision")]
    verdict: Option<String>,
}

impl RawVerdict {
    fn same(&self) -> Option<bool> {
        if let Some(same) = self.same {
            return Some(same);
        }
        match self.verdict.as_deref()?.trim().to_lowercase().as_str() {
            "same" | "identical" | "duplicate" | "merge" | "yes" => Some(true),
            "distinct" | "different" | "no" => Some(false),
            _ => None,
        }
    }
}

/// Strip a markdown code fence, or cut to the outermost braces.
fn extract_json(content: &str) -> &str {
    static JSON_BLOCK: Lazy<Option<Regex>> =
        Lazy::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok());

    if let Some(caps) = JSON_BLOCK.as_ref().and_then(|re| re.captures(content)) {
        if let Some(m) = caps.get(1) {
            return m.as_str().trim();
        }
    }

    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => content,
    }
}

fn lenient_parse(json_str: &str) -> Option<RawVerdicts> {
    let fixed = json_str
        .replace('\'', "\"")
        .replace(",]", "]")
        .replace(",}", "}");
    serde_json::from_str(&fixed).ok()
}

const RESOLVER_SYSTEM_PROMPT: &str = r#"You are an entity resolution judge. Each numbered pair holds two names of the same entity type extracted from one document collection. Decide whether both names refer to the same real-world entity.

Respond with a JSON object:
{
  "verdicts": [
    {"pair": <index>, "same": true | false}
  ]
}

Answer for every pair. Say "same": true only when you are confident the names denote one entity (abbreviations, nicknames, legal names, spelling variants). Related but different entities (a company and its product, a parent and a subsidiary) are not the same.
"#;
