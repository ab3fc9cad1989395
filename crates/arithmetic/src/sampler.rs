//! Vocabulary sampling for a schema's `vocab` section.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value as JsonValue};

use crate::domains::DomainSampler;
use crate::schema::{OrderedMap, VocabKind, VocabSpec};
use crate::transforms::pluralize;
use crate::vocab::{Person, Vocab};

/// Sampled vocab items in declaration order.
pub type VocabItems = Map<String, JsonValue>;

const RANDOM_DOMAIN: &str = "random";

/// Redraws allowed when a person repeats an excluded name.
const PERSON_RETRIES: usize = 16;

pub struct VocabSampler<'a> {
    vocab: &'a Vocab,
    messy_vocab_prob: f64,
}

impl<'a> VocabSampler<'a> {
    pub fn new(vocab: &'a Vocab) -> Self {
        Self {
            vocab,
            messy_vocab_prob: 0.0,
        }
    }

    /// Chance that a person is drawn from the diverse name lists.
    pub fn with_messy_prob(mut self, prob: f64) -> Self {
        self.messy_vocab_prob = prob.clamp(0.0, 1.0);
        self
    }

    /// Sample every spec in order. `distinct_from` only sees earlier keys.
    pub fn sample<R: Rng + ?Sized>(&self, specs: &OrderedMap<VocabSpec>, rng: &mut R) -> VocabItems {
        let mut items = VocabItems::new();

        for (name, spec) in specs.iter() {
            // People are also excluded by name.
            let exclude: Vec<JsonValue> = spec
                .distinct_from
                .iter()
                .filter_map(|other| items.get(other))
                .flat_map(|value| [Some(value), value.get("name")].into_iter().flatten().cloned())
                .collect();

            let value = self.sample_one(spec, &exclude, rng);

            let plural = match (&spec.path, &value) {
                (Some(path), JsonValue::String(word))
                    if spec.sample.is_none() && path.contains("countable_singular") =>
                {
                    Some(pluralize(word))
                }
                _ => None,
            };

            items.insert(name.to_string(), value);
            if let Some(plural) = plural {
                items.insert(format!("{}_plural", name), JsonValue::String(plural));
            }
        }
        items
    }

    pub fn sample_one<R: Rng + ?Sized>(&self, spec: &VocabSpec, exclude: &[JsonValue], rng: &mut R) -> JsonValue {
        match spec.kind {
            Some(VocabKind::PersonWithPronouns) => {
                let mut person = self.draw_person(rng);
                for _ in 0..PERSON_RETRIES {
                    if !exclude.contains(&JsonValue::String(person.name.clone())) {
                        break;
                    }
                    person = self.draw_person(rng);
                }
                person.to_json()
            }
            Some(VocabKind::DomainContext) => {
                let domains = DomainSampler::new(self.vocab);
                let name = match spec.domain.as_deref() {
                    None | Some(RANDOM_DOMAIN) => domains.random_domain(rng),
                    Some(name) => name.to_string(),
                };
                domains.sample(&name, rng).to_json()
            }
            Some(VocabKind::Choice) => {
                let values: Vec<&JsonValue> = spec
                    .values
                    .iter()
                    .flatten()
                    .filter(|v| !exclude.contains(v))
                    .collect();
                values
                    .choose(rng)
                    .map(|v| (*v).clone())
                    .unwrap_or_else(|| JsonValue::String(String::new()))
            }
            None => match (&spec.path, spec.sample) {
                (Some(path), Some(k)) => JsonValue::Array(self.vocab.sample(path, k, rng)),
                (Some(path), None) => self.sample_excluding(path, exclude, rng),
                (None, _) => JsonValue::Null,
            },
        }
    }

    fn draw_person<R: Rng + ?Sized>(&self, rng: &mut R) -> Person {
        let messy = self.messy_vocab_prob > 0.0 && rng.gen_bool(self.messy_vocab_prob);
        if messy {
            self.vocab.diverse_person(rng)
        } else {
            self.vocab.person_with_pronouns(rng)
        }
    }

    /// Random item from `path` avoiding `exclude`, unless that empties the list.
    fn sample_excluding<R: Rng + ?Sized>(&self, path: &str, exclude: &[JsonValue], rng: &mut R) -> JsonValue {
        let Some(items) = self.vocab.get_list(path) else {
            tracing::warn!(path = %path, "Vocab path is missing or not a list");
            return JsonValue::Null;
        };

        let available: Vec<&JsonValue> = items.iter().filter(|item| !exclude.contains(item)).collect();
        let picked = if available.is_empty() {
            items.choose(rng)
        } else {
            available.choose(rng).copied()
        };
        picked.cloned().unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn vocab() -> Vocab {
        Vocab::from_value(json!({
            "names": {
                "female": ["Ana"],
                "male": ["Tom"],
                "neutral": ["Sam"],
                "pronouns": {
                    "female": {"subject": "she", "object": "her", "possessive": "her", "reflexive": "herself"},
                    "male": {"subject": "he", "object": "him", "possessive": "his", "reflexive": "himself"},
                    "neutral": {"subject": "they", "object": "them", "possessive": "their", "reflexive": "themselves"}
                }
            },
            "items": {"countable_singular": ["box", "cherry"]},
            "messy": {"names_diverse": {"male": ["Kwame"], "female": ["Ngozi"]}}
        }))
    }

    fn specs(value: JsonValue) -> OrderedMap<VocabSpec> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_distinct_from_and_plural() {
        let vocab = vocab();
        let sampler = VocabSampler::new(&vocab);
        let specs = specs(json!({
            "item1": {"path": "items.countable_singular"},
            "item2": {"path": "items.countable_singular", "distinct_from": ["item1"]}
        }));

        for seed in 0..20 {
            let items = sampler.sample(&specs, &mut StdRng::seed_from_u64(seed));
            assert_ne!(items["item1"], items["item2"]);
            let plural = items["item1_plural"].as_str().unwrap();
            assert!(plural == "boxes" || plural == "cherries");
        }
    }

    #[test]
    fn test_choice_excludes_and_falls_back_to_empty() {
        let vocab = vocab();
        let sampler = VocabSampler::new(&vocab);
        let specs = specs(json!({
            "a": {"type": "choice", "values": ["red"]},
            "b": {"type": "choice", "values": ["red"], "distinct_from": ["a"]}
        }));

        let items = sampler.sample(&specs, &mut StdRng::seed_from_u64(1));
        assert_eq!(items["a"], json!("red"));
        assert_eq!(items["b"], json!(""));
    }

    #[test]
    fn test_sample_list_and_missing_path() {
        let vocab = vocab();
        let sampler = VocabSampler::new(&vocab);
        let specs = specs(json!({
            "pair": {"path": "items.countable_singular", "sample": 2},
            "ghost": {"path": "items.none"}
        }));

        let items = sampler.sample(&specs, &mut StdRng::seed_from_u64(1));
        assert_eq!(items["pair"].as_array().unwrap().len(), 2);
        assert!(!items.contains_key("pair_plural"));
        assert_eq!(items["ghost"], JsonValue::Null);
    }

    #[test]
    fn test_people_distinct_by_name() {
        let vocab = vocab();
        let sampler = VocabSampler::new(&vocab);
        let specs = specs(json!({
            "person1": {"type": "person_with_pronouns"},
            "person2": {"type": "person_with_pronouns", "distinct_from": ["person1"]}
        }));

        for seed in 0..20 {
            let items = sampler.sample(&specs, &mut StdRng::seed_from_u64(seed));
            assert_ne!(items["person1"]["name"], items["person2"]["name"]);
        }
    }

    #[test]
    fn test_messy_person() {
        let vocab = vocab();
        let sampler = VocabSampler::new(&vocab).with_messy_prob(1.0);
        let specs = specs(json!({"person": {"type": "person_with_pronouns"}}));

        let items = sampler.sample(&specs, &mut StdRng::seed_from_u64(7));
        let name = items["person"]["name"].as_str().unwrap();
        assert!(name == "Kwame" || name == "Ngozi");
    }

    #[test]
    fn test_same_seed_same_items() {
        let vocab = vocab();
        let sampler = VocabSampler::new(&vocab).with_messy_prob(0.5);
        let specs = specs(json!({
            "person": {"type": "person_with_pronouns"},
            "item": {"path": "items.countable_singular"}
        }));

        let first = sampler.sample(&specs, &mut StdRng::seed_from_u64(11));
        let second = sampler.sample(&specs, &mut StdRng::seed_from_u64(11));
        assert_eq!(first, second);
    }
}
