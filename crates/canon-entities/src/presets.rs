//! Domain presets and schema merging.
//!
//! Each domain contributes an entity-type list, a relation-type vocabulary
//! and trigger words for the keyword classifier. A text unit tagged with
//! several domains is extracted with the union of their vocabularies.

use std::collections::BTreeMap;

use canon_core::config::PresetDefinition;
use canon_core::types::{DomainKey, ExtractionSchema};

/// Name of the preset used when nothing else applies.
pub const GENERAL_PRESET: &str = "general";

fn preset(entity_types: &[&str], relations: &[(&str, &str)], keywords: &[&str]) -> PresetDefinition {
    PresetDefinition {
        entity_types: entity_types.iter().map(|s| s.to_string()).collect(),
        relation_types: relations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    }
}

/// Presets shipped with the crate.
pub fn builtin_presets() -> BTreeMap<String, PresetDefinition> {
    let mut presets = BTreeMap::new();

    presets.insert(
        GENERAL_PRESET.to_string(),
        preset(
            &["person", "organization", "location", "date", "event", "product", "concept"],
            &[
                ("works_for", "person is employed by organization"),
                ("located_in", "entity is located in a place"),
                ("part_of", "entity is a component or member of another"),
                ("related_to", "entities are related in some other way"),
            ],
            &[],
        ),
    );

    presets.insert(
        "business".to_string(),
        preset(
            &["person", "organization", "role", "location", "product", "money", "date"],
            &[
                ("works_for", "person is employed by organization"),
                ("ceo_of", "person is chief executive of organization"),
                ("founded", "person or organization founded an organization"),
                ("acquired", "organization acquired another organization"),
                ("partner_of", "organizations have a partnership"),
                ("competitor_of", "organizations compete in a market"),
                ("located_in", "organization is headquartered in a place"),
            ],
            &[
                "company", "ceo", "revenue", "market", "acquisition", "startup", "business",
                "investor", "customers", "profit", "board",
            ],
        ),
    );

    presets.insert(
        "technology".to_string(),
        preset(
            &[
                "technology",
                "software",
                "organization",
                "person",
                "product",
                "programming_language",
                "framework",
            ],
            &[
                ("developed_by", "software or technology was built by an organization or person"),
                ("uses", "entity uses a technology"),
                ("built_with", "software is built with a language or framework"),
                ("integrates_with", "software integrates with another"),
                ("competitor_of", "products compete with each other"),
            ],
            &[
                "software", "ai", "cloud", "api", "technology", "platform", "machine learning",
                "data", "algorithm", "app", "server",
            ],
        ),
    );

    presets.insert(
        "ecommerce".to_string(),
        preset(
            &["product", "brand", "category", "price", "store", "customer", "organization"],
            &[
                ("sold_by", "product is sold by a store"),
                ("manufactured_by", "product is made by a brand or organization"),
                ("belongs_to_category", "product belongs to a category"),
                ("priced_at", "product has a price"),
                ("reviewed_by", "product was reviewed by a customer"),
            ],
            &[
                "price", "cart", "order", "shipping", "checkout", "product", "discount", "sku",
                "store", "buy", "refund",
            ],
        ),
    );

    presets.insert(
        "code".to_string(),
        preset(
            &["function", "class", "module", "variable", "library", "api_endpoint", "file"],
            &[
                ("calls", "function calls another function"),
                ("imports", "module imports a library or module"),
                ("defines", "module or class defines a symbol"),
                ("inherits_from", "class extends another class"),
                ("depends_on", "component depends on a library"),
                ("returns", "function returns a type"),
            ],
            &[
                "function", "class", "import", "return", "module", "struct", "variable",
                "method", "def", "fn", "compile", "impl",
            ],
        ),
    );

    presets.insert(
        "documentation".to_string(),
        preset(
            &["concept", "feature", "configuration", "command", "api", "version", "product"],
            &[
                ("describes", "document section describes a concept or feature"),
                ("configures", "setting configures a feature"),
                ("requires", "feature requires another feature or version"),
                ("deprecated_by", "feature was replaced by another"),
                ("part_of", "feature is part of a product"),
            ],
            &[
                "documentation", "guide", "tutorial", "install", "configuration", "readme",
                "reference", "example", "usage", "setup",
            ],
        ),
    );

    presets.insert(
        "legal".to_string(),
        preset(
            &["party", "organization", "person", "contract", "clause", "jurisdiction", "law", "date"],
            &[
                ("party_to", "party is bound by a contract"),
                ("governed_by", "contract is governed by a law or jurisdiction"),
                ("obligates", "clause obligates a party"),
                ("terminates", "event or clause terminates a contract"),
                ("signed_by", "contract was signed by a party"),
            ],
            &[
                "agreement", "contract", "clause", "party", "liability", "jurisdiction",
                "plaintiff", "defendant", "court", "statute", "hereby",
            ],
        ),
    );

    presets.insert(
        "medical".to_string(),
        preset(
            &["disease", "drug", "symptom", "treatment", "anatomy", "person", "organization"],
            &[
                ("treats", "drug or treatment treats a disease"),
                ("causes", "entity causes a disease or symptom"),
                ("symptom_of", "symptom indicates a disease"),
                ("prescribed_for", "drug is prescribed for a condition"),
                ("contraindicated_with", "drug must not be combined with another"),
            ],
            &[
                "patient", "diagnosis", "treatment", "symptom", "disease", "clinical", "drug",
                "dose", "therapy",
            ],
        ),
    );

    presets.insert(
        "finance".to_string(),
        preset(
            &["organization", "financial_instrument", "currency", "money", "person", "market", "date"],
            &[
                ("issued_by", "instrument was issued by an organization"),
                ("traded_on", "instrument is traded on a market"),
                ("invested_in", "entity invested in another"),
                ("valued_at", "entity has a valuation"),
                ("owns", "entity owns an asset"),
            ],
            &[
                "stock", "bond", "investment", "portfolio", "dividend", "interest rate", "bank",
                "loan", "equity", "shares",
            ],
        ),
    );

    presets
}

/// Unions preset vocabularies into one extraction schema per domain combination.
#[derive(Debug, Clone)]
pub struct PresetMerger {
    presets: BTreeMap<String, PresetDefinition>,
}

impl PresetMerger {
    /// Create a merger over the built-in presets plus user presets.
    ///
    /// A user preset replaces the built-in preset of the same name.
    pub fn new(user_presets: &BTreeMap<String, PresetDefinition>) -> Self {
        let mut presets = builtin_presets();
        for (name, definition) in user_presets {
            presets.insert(name.trim().to_lowercase(), definition.clone());
        }
        Self { presets }
    }

    /// Merger over the built-in presets only.
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Look up a preset by domain name.
    pub fn get(&self, domain: &str) -> Option<&PresetDefinition> {
        self.presets.get(domain)
    }

    /// All known presets, by name.
    pub fn presets(&self) -> &BTreeMap<String, PresetDefinition> {
        &self.presets
    }

    /// Build the merged schema for a domain combination.
    ///
    /// Entity types keep first-seen order across domains (in sorted key order).
    /// For relation types described by several domains the first domain wins.
    /// Unknown domains contribute nothing; an empty union falls back to the
    /// general preset.
    pub fn merge(&self, key: &DomainKey) -> ExtractionSchema {
        let mut schema = ExtractionSchema::default();

        for domain in key.labels() {
            let Some(definition) = self.presets.get(domain) else {
                tracing::debug!("No preset for domain '{}'", domain);
                continue;
            };

            for entity_type in &definition.entity_types {
                let entity_type = entity_type.trim().to_lowercase();
                if !entity_type.is_empty() && !schema.entity_types.contains(&entity_type) {
                    schema.entity_types.push(entity_type);
                }
            }
            for (relation, description) in &definition.relation_types {
                schema
                    .relation_types
                    .entry(relation.clone())
                    .or_insert_with(|| description.clone());
            }
        }

        if schema.is_empty() && !key.contains(GENERAL_PRESET) {
            return self.merge(&DomainKey::single(GENERAL_PRESET));
        }

        schema
    }
}

impl Default for PresetMerger {
    fn default() -> Self {
        Self::builtin()
    }
}
