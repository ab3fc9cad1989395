//! Domain bundles.
//!
//! A domain keeps agents, items and verbs coherent: a kitchen bakes cookies
//! in Oven 2 over hours, it never "manufactures laps".

use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::transforms::pluralize;
use crate::vocab::Vocab;

pub const DEFAULT_DOMAIN: &str = "default";

/// Vocabulary sampled from one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainContext {
    pub domain: String,
    pub agent: String,
    pub agent_type: String,
    pub item: String,
    pub item_plural: String,
    pub verb: String,
    pub verb_plural: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit_plural: Option<String>,
}

impl DomainContext {
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Samples [`DomainContext`]s from `domains.*` in the vocab.
#[derive(Debug, Clone, Copy)]
pub struct DomainSampler<'a> {
    vocab: &'a Vocab,
}

impl<'a> DomainSampler<'a> {
    pub fn new(vocab: &'a Vocab) -> Self {
        Self { vocab }
    }

    pub fn list_domains(&self) -> Vec<String> {
        self.vocab.domain_names()
    }

    pub fn random_domain<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.list_domains()
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
    }

    /// Sample a context; an unknown domain yields the default context.
    pub fn sample<R: Rng + ?Sized>(&self, domain_name: &str, rng: &mut R) -> DomainContext {
        let Some(domain) = self
            .vocab
            .get(&format!("domains.{}", domain_name))
            .and_then(JsonValue::as_object)
        else {
            tracing::debug!(domain = %domain_name, "Unknown domain, using default context");
            return self.default_context(rng);
        };

        let templates = domain.get("agent_templates").and_then(JsonValue::as_object);
        let (agent, agent_type) = match templates.and_then(|t| t.iter().choose(rng)) {
            Some((agent_type, template)) => (self.sample_agent(template, rng), agent_type.clone()),
            None => (self.vocab.person_with_pronouns(rng).name, "person".to_string()),
        };

        let items = domain.get("items").and_then(JsonValue::as_array);
        let (item, item_plural) = match items.and_then(|list| list.choose(rng)) {
            Some(JsonValue::Object(spec)) => {
                let singular = spec
                    .get("singular")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("item")
                    .to_string();
                let plural = spec
                    .get("plural")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| pluralize(&singular));
                (singular, plural)
            }
            Some(JsonValue::String(item)) => (item.clone(), pluralize(item)),
            _ => ("item".to_string(), "items".to_string()),
        };

        let verbs = domain.get("verbs");
        let verb_form = |key: &str, default: &str| {
            verbs
                .and_then(|v| v.get(key))
                .and_then(JsonValue::as_str)
                .unwrap_or(default)
                .to_string()
        };

        let time_unit = domain
            .get("time_units")
            .and_then(JsonValue::as_array)
            .and_then(|units| units.choose(rng));
        let unit_form = |key: &str, default: &str| {
            time_unit.map(|unit| {
                unit.get(key)
                    .and_then(JsonValue::as_str)
                    .unwrap_or(default)
                    .to_string()
            })
        };

        DomainContext {
            domain: domain_name.to_string(),
            agent,
            agent_type,
            item,
            item_plural,
            verb: verb_form("singular", "processes"),
            verb_plural: verb_form("plural", "process"),
            time_unit: unit_form("singular", "hour"),
            time_unit_plural: unit_form("plural", "hours"),
        }
    }

    /// Fill an agent pattern from its `numbers`, `letters` or `source`.
    fn sample_agent<R: Rng + ?Sized>(&self, template: &JsonValue, rng: &mut R) -> String {
        let pattern = template
            .get("pattern")
            .and_then(JsonValue::as_str)
            .unwrap_or("${name}");

        let pick = |key: &str, rng: &mut R| {
            template
                .get(key)
                .and_then(JsonValue::as_array)
                .and_then(|list| list.choose(rng))
                .map(scalar_text)
        };

        if let Some(number) = pick("numbers", rng) {
            return pattern.replace("${number}", &number);
        }
        if let Some(letter) = pick("letters", rng) {
            return pattern.replace("${letter}", &letter);
        }
        if let Some(source) = template.get("source").and_then(JsonValue::as_str) {
            if let Some(name) = self.vocab.random(source, rng) {
                return pattern.replace("${name}", &scalar_text(name));
            }
        }
        pattern.to_string()
    }

    fn default_context<R: Rng + ?Sized>(&self, rng: &mut R) -> DomainContext {
        DomainContext {
            domain: DEFAULT_DOMAIN.to_string(),
            agent: self.vocab.person_with_pronouns(rng).name,
            agent_type: "person".to_string(),
            item: "item".to_string(),
            item_plural: "items".to_string(),
            verb: "has".to_string(),
            verb_plural: "have".to_string(),
            time_unit: None,
            time_unit_plural: None,
        }
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
