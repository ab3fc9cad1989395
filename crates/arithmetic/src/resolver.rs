//! Template variable resolution.
//!
//! `template_vars` entries are small specs evaluated against the sampled
//! variables and vocab:
//!
//! - `person.name`: dotted access into structured vocab (list indices too)
//! - `item|pluralize|capitalize`: piped transforms
//! - `item`: direct lookup, vocab first, then variables
//! - anything else is a literal

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use virtual_expert_core::Value;

use crate::sampler::VocabItems;
use crate::schema::OrderedMap;
use crate::transforms::{capitalize, TransformRegistry};
use crate::variables::VariableMap;

/// Final values available to `${name}` placeholders.
pub type TemplateVars = BTreeMap<String, Value>;

/// Shortcuts derived from a sampled person, suffixed with `N` for `personN`.
pub const PERSON_SHORTCUTS: [&str; 11] = [
    "name",
    "subject",
    "subj",
    "his_her",
    "him_her",
    "reflexive",
    "verb_s",
    "has_have",
    "does_do",
    "is_are",
    "was_were",
];

/// Words generated when a schema has a `multiplier` variable.
pub const MULTIPLIER_VARS: [&str; 2] = ["mult_word", "growth_word"];

#[derive(Debug, Clone, Default)]
pub struct TemplateResolver {
    transforms: TransformRegistry,
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transforms(transforms: TransformRegistry) -> Self {
        Self { transforms }
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformRegistry {
        &mut self.transforms
    }

    /// Resolve one spec. `Null` means a dotted path that led nowhere.
    pub fn resolve(&self, spec: &str, variables: &VariableMap, items: &VocabItems) -> JsonValue {
        if let Some((head, pipes)) = spec.split_once('|') {
            let mut value = self.resolve(head, variables, items);
            for name in pipes.split('|') {
                if value.is_null() {
                    break;
                }
                match self.transforms.apply(&text_of(&value), name) {
                    Ok(out) => value = JsonValue::String(out),
                    Err(e) => {
                        tracing::warn!(transform = %name, spec = %spec, error = %e, "Unknown transform, value unchanged");
                    }
                }
            }
            return value;
        }

        if let Some((head, rest)) = spec.split_once('.') {
            let Some(mut current) = lookup(head, variables, items) else {
                return JsonValue::Null;
            };
            for part in rest.split('.') {
                current = match &current {
                    JsonValue::Object(map) => map.get(part).cloned().unwrap_or(JsonValue::Null),
                    JsonValue::Array(list) => part
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| list.get(i).cloned())
                        .unwrap_or(JsonValue::Null),
                    _ => JsonValue::Null,
                };
            }
            return current;
        }

        lookup(spec, variables, items).unwrap_or_else(|| JsonValue::String(spec.to_string()))
    }

    pub fn resolve_all(
        &self,
        specs: &OrderedMap<String>,
        variables: &VariableMap,
        items: &VocabItems,
    ) -> BTreeMap<String, JsonValue> {
        specs
            .iter()
            .map(|(name, spec)| (name.to_string(), self.resolve(spec, variables, items)))
            .collect()
    }

    /// Every value a template may reference, in override order: resolved
    /// specs, numeric variables, multiplier words, expanded vocab.
    pub fn build_template_vars(
        &self,
        specs: &OrderedMap<String>,
        variables: &VariableMap,
        items: &VocabItems,
    ) -> TemplateVars {
        let mut vars = TemplateVars::new();

        for (name, value) in self.resolve_all(specs, variables, items) {
            insert_json(&mut vars, name, &value);
        }

        vars.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(multiplier) = variables.get("multiplier") {
            let (mult_word, growth_word) = multiplier_words(multiplier);
            vars.insert("mult_word".into(), Value::Text(mult_word));
            vars.insert("growth_word".into(), Value::Text(growth_word));
        }

        expand_vocab_items(&mut vars, items);
        vars
    }
}

/// Vocab first, then variables.
fn lookup(name: &str, variables: &VariableMap, items: &VocabItems) -> Option<JsonValue> {
    items
        .get(name)
        .filter(|v| !v.is_null())
        .cloned()
        .or_else(|| variables.get(name).map(to_json))
}

fn to_json(value: &Value) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

/// Text form used for transforms and substitution.
fn text_of(value: &JsonValue) -> String {
    match Value::from_json(value) {
        Some(scalar) => scalar.to_string(),
        None => value.to_string(),
    }
}

fn insert_json(vars: &mut TemplateVars, name: String, value: &JsonValue) {
    if value.is_null() {
        return;
    }
    let scalar = Value::from_json(value).unwrap_or_else(|| Value::Text(value.to_string()));
    vars.insert(name, scalar);
}

pub fn multiplier_words(multiplier: &Value) -> (String, String) {
    let mult_word = match multiplier.as_i64() {
        Some(2) => "twice".to_string(),
        Some(3) => "three times".to_string(),
        Some(4) => "four times".to_string(),
        Some(5) => "five times".to_string(),
        _ => format!("{} times", multiplier),
    };
    let growth_word = match multiplier.as_i64() {
        Some(2) => "doubled".to_string(),
        Some(3) => "tripled".to_string(),
        Some(4) => "quadrupled".to_string(),
        Some(5) => "quintupled".to_string(),
        _ => format!("multiplied by {}", multiplier),
    };
    (mult_word, growth_word)
}

/// Flatten structured vocab: `key_field` for objects, `key_i` for lists,
/// pronoun shortcuts for `person` and `personN`.
fn expand_vocab_items(vars: &mut TemplateVars, items: &VocabItems) {
    for (key, value) in items {
        match value {
            JsonValue::Object(fields) => {
                for (field, v) in fields {
                    insert_json(vars, format!("{}_{}", key, field), v);
                }
                let is_person = fields.contains_key("name") && fields.contains_key("subject");
                if let Some(suffix) = key.strip_prefix("person").filter(|_| is_person) {
                    add_person_shortcuts(vars, suffix, value);
                }
            }
            JsonValue::Array(list) => {
                for (i, item) in list.iter().enumerate() {
                    insert_json(vars, format!("{}_{}", key, i), item);
                }
            }
            other => insert_json(vars, key.clone(), other),
        }
    }
}

fn add_person_shortcuts(vars: &mut TemplateVars, suffix: &str, person: &JsonValue) {
    let field = |key: &str| person.get(key).and_then(JsonValue::as_str).unwrap_or_default();
    let verb_s = person.get("verb_s").and_then(JsonValue::as_str).unwrap_or("s");
    let singular = verb_s == "s";
    let pick = |one: &str, many: &str| (if singular { one } else { many }).to_string();

    let shortcuts = [
        ("name", field("name").to_string()),
        ("subject", field("subject").to_string()),
        ("subj", capitalize(field("subject"))),
        ("his_her", field("possessive").to_string()),
        ("him_her", field("object").to_string()),
        ("reflexive", field("reflexive").to_string()),
        ("verb_s", verb_s.to_string()),
        ("has_have", pick("has", "have")),
        ("does_do", pick("does", "do")),
        ("is_are", pick("is", "are")),
        ("was_were", pick("was", "were")),
    ];
    for (name, value) in shortcuts {
        vars.insert(format!("{}{}", name, suffix), Value::Text(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> VocabItems {
        match json!({
            "person": {"name": "Mia", "subject": "she", "object": "her", "possessive": "her", "reflexive": "herself", "verb_s": "s"},
            "person2": {"name": "Sam", "subject": "they", "object": "them", "possessive": "their", "reflexive": "themselves", "verb_s": ""},
            "item": "cherry",
            "fruits": ["fig", "kiwi"]
        }) {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn variables() -> VariableMap {
        let mut vars = VariableMap::new();
        vars.insert("count".into(), Value::Int(4));
        vars.insert("multiplier".into(), Value::Int(3));
        vars
    }

    #[test]
    fn test_resolve_forms() {
        let resolver = TemplateResolver::new();
        let (vars, items) = (variables(), items());

        assert_eq!(resolver.resolve("person.name", &vars, &items), json!("Mia"));
        assert_eq!(resolver.resolve("fruits.1", &vars, &items), json!("kiwi"));
        assert_eq!(resolver.resolve("fruits.7", &vars, &items), JsonValue::Null);
        assert_eq!(resolver.resolve("item|pluralize|capitalize", &vars, &items), json!("Cherries"));
        assert_eq!(resolver.resolve("count", &vars, &items), json!(4));
        assert_eq!(resolver.resolve("dozen", &vars, &items), json!("dozen"));
    }

    #[test]
    fn test_unknown_transform_keeps_value() {
        let resolver = TemplateResolver::new();
        let value = resolver.resolve("item|sparkle|upper", &variables(), &items());
        assert_eq!(value, json!("CHERRY"));
    }

    #[test]
    fn test_build_template_vars() {
        let resolver = TemplateResolver::new();
        let specs: OrderedMap<String> =
            serde_json::from_value(json!({"items": "item|pluralize", "missing": "person.age"})).unwrap();

        let vars = resolver.build_template_vars(&specs, &variables(), &items());

        assert_eq!(vars["items"], Value::Text("cherries".into()));
        assert!(!vars.contains_key("missing"));
        assert_eq!(vars["count"], Value::Int(4));
        assert_eq!(vars["mult_word"], Value::Text("three times".into()));
        assert_eq!(vars["growth_word"], Value::Text("tripled".into()));

        assert_eq!(vars["name"], Value::Text("Mia".into()));
        assert_eq!(vars["subj"], Value::Text("She".into()));
        assert_eq!(vars["has_have"], Value::Text("has".into()));
        assert_eq!(vars["person_possessive"], Value::Text("her".into()));

        assert_eq!(vars["name2"], Value::Text("Sam".into()));
        assert_eq!(vars["is_are2"], Value::Text("are".into()));
        assert_eq!(vars["fruits_0"], Value::Text("fig".into()));
        assert_eq!(vars["item"], Value::Text("cherry".into()));
    }

    #[test]
    fn test_multiplier_words_fallback() {
        assert_eq!(
            multiplier_words(&Value::Int(7)),
            ("7 times".to_string(), "multiplied by 7".to_string())
        );
        assert_eq!(multiplier_words(&Value::Float(2.0)).0, "twice");
    }
}
