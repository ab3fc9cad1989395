//! Pattern/schema contracts.
//!
//! Every `${var}` a schema's templates mention must be produced by the
//! schema: explicit `template_vars`, variables, derived values, sampled
//! vocab, or one of the generated helpers.

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::resolver::{MULTIPLIER_VARS, PERSON_SHORTCUTS};
use crate::schema::{SchemaSpec, VocabKind};
use crate::template;
use crate::vocab::Vocab;

/// Fields produced by a `domain_context` vocab entry.
const DOMAIN_FIELDS: [&str; 9] = [
    "domain",
    "agent",
    "agent_type",
    "item",
    "item_plural",
    "verb",
    "verb_plural",
    "time_unit",
    "time_unit_plural",
];

const PERSON_FIELDS: [&str; 6] = ["name", "subject", "object", "possessive", "reflexive", "verb_s"];

pub struct ContractValidator<'a> {
    vocab: &'a Vocab,
}

impl<'a> ContractValidator<'a> {
    pub fn new(vocab: &'a Vocab) -> Self {
        Self { vocab }
    }

    /// Errors for one schema; empty when the contract holds.
    pub fn validate_schema(&self, schema: &SchemaSpec) -> Vec<String> {
        let templates = match &schema.pattern {
            Some(pattern) => {
                let Some(data) = self.vocab.get(&format!("patterns.{}", pattern)) else {
                    return vec![format!("Pattern '{}' not found", pattern)];
                };
                let templates = template_texts(data, schema.variant.as_deref());
                if templates.is_empty() {
                    return vec![match &schema.variant {
                        Some(variant) => format!("Variant '{}' not found in pattern '{}'", variant, pattern),
                        None => format!("No templates found in pattern '{}'", pattern),
                    }];
                }
                templates
            }
            None => schema.templates.clone(),
        };

        let required: BTreeSet<String> = templates
            .iter()
            .flat_map(|t| template::placeholders(t))
            .collect();
        let provided = provided_vars(schema);
        let missing: Vec<&String> = required.difference(&provided).collect();

        if missing.is_empty() {
            Vec::new()
        } else {
            let source = schema.pattern.as_deref().unwrap_or("inline templates");
            vec![format!(
                "Schema '{}' missing template vars for '{}': {:?}",
                schema.name, source, missing
            )]
        }
    }

    /// Errors by schema name, for schemas that have any.
    pub fn validate_all<'s>(
        &self,
        schemas: impl IntoIterator<Item = &'s SchemaSpec>,
    ) -> BTreeMap<String, Vec<String>> {
        schemas
            .into_iter()
            .filter(|schema| !schema.is_abstract)
            .map(|schema| (schema.name.clone(), self.validate_schema(schema)))
            .filter(|(_, errors)| !errors.is_empty())
            .collect()
    }

    /// Placeholders required by a pattern variant.
    pub fn pattern_requirements(&self, pattern: &str, variant: Option<&str>) -> BTreeSet<String> {
        self.vocab
            .get(&format!("patterns.{}", pattern))
            .map(|data| template_texts(data, variant))
            .unwrap_or_default()
            .iter()
            .flat_map(|t| template::placeholders(t))
            .collect()
    }
}

/// Template strings for a variant; weighted entries contribute their text.
fn template_texts(data: &JsonValue, variant: Option<&str>) -> Vec<String> {
    let raw = match data {
        JsonValue::Object(map) => variant
            .and_then(|v| map.get(v))
            .or_else(|| map.get("templates")),
        other => Some(other),
    };

    raw.and_then(JsonValue::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|entry| match entry {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Object(map) => map.get("text").and_then(JsonValue::as_str).map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Everything generation will put into the template variables.
fn provided_vars(schema: &SchemaSpec) -> BTreeSet<String> {
    let mut provided = schema.provided_template_vars();

    for (name, spec) in schema.vocab.iter() {
        provided.insert(name.to_string());
        match spec.kind {
            Some(VocabKind::PersonWithPronouns) => {
                provided.extend(PERSON_FIELDS.iter().map(|f| format!("{}_{}", name, f)));
                if let Some(suffix) = name.strip_prefix("person") {
                    provided.extend(PERSON_SHORTCUTS.iter().map(|s| format!("{}{}", s, suffix)));
                }
            }
            Some(VocabKind::DomainContext) => {
                provided.extend(DOMAIN_FIELDS.iter().map(|f| format!("{}_{}", name, f)));
            }
            Some(VocabKind::Choice) => {}
            None => {
                if let Some(k) = spec.sample {
                    provided.extend((0..k).map(|i| format!("{}_{}", name, i)));
                }
                if spec.path.as_deref().is_some_and(|p| p.contains("countable_singular")) {
                    provided.insert(format!("{}_plural", name));
                }
            }
        }
    }

    if schema.variables.contains_key("multiplier") || schema.derived.contains_key("multiplier") {
        provided.extend(MULTIPLIER_VARS.iter().map(|s| s.to_string()));
    }
    provided
}
