//! Vocabulary store.
//!
//! A vocab directory holds JSON files addressed by dotted paths:
//!
//! ```text
//! vocab/
//!   names.json         -> names.male, names.pronouns.female, ...
//!   items.json         -> items.countable_singular, ...
//!   patterns/**.json   -> patterns.<file stem>
//!   domains/*.json     -> domains.<"name" field or file stem>
//!   messy/*.json       -> messy.<file stem>
//! ```

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fs;
use std::path::{Path, PathBuf};

use virtual_expert_core::{Error, Result};

use crate::transforms;

const PATTERNS_DIR: &str = "patterns";
const DOMAINS_DIR: &str = "domains";
const MESSY_DIR: &str = "messy";

/// A name with matching pronouns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub subject: String,
    pub object: String,
    pub possessive: String,
    pub reflexive: String,
    /// `"s"` for singular verbs ("she eats"), empty for "they eat".
    pub verb_s: String,
}

impl Person {
    pub fn fallback() -> Self {
        Self {
            name: "Alex".into(),
            subject: "they".into(),
            object: "them".into(),
            possessive: "their".into(),
            reflexive: "themselves".into(),
            verb_s: String::new(),
        }
    }

    fn with_pronouns(name: String, pronouns: Option<&JsonValue>, verb_s: &str) -> Self {
        let field = |key: &str, default: &str| {
            pronouns
                .and_then(|p| p.get(key))
                .and_then(JsonValue::as_str)
                .unwrap_or(default)
                .to_string()
        };
        Self {
            name,
            subject: field("subject", "they"),
            object: field("object", "them"),
            possessive: field("possessive", "their"),
            reflexive: field("reflexive", "themselves"),
            verb_s: verb_s.to_string(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "name": self.name,
            "subject": self.subject,
            "object": self.object,
            "possessive": self.possessive,
            "reflexive": self.reflexive,
            "verb_s": self.verb_s,
        })
    }
}

const GENDERS: [(&str, u32); 3] = [("male", 45), ("female", 45), ("neutral", 10)];

/// Loaded vocabulary tree.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    root: Map<String, JsonValue>,
}

impl Vocab {
    /// Build from an in-memory tree. Non-object values give an empty vocab.
    pub fn from_value(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Load every vocab file under `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::vocab(format!("Vocab directory not found: {}", dir.display())));
        }

        let mut root = Map::new();
        for path in json_files(dir)? {
            root.insert(stem(&path), read_json(&path)?);
        }

        let patterns_dir = dir.join(PATTERNS_DIR);
        if patterns_dir.is_dir() {
            let mut patterns = Map::new();
            for path in json_files(&patterns_dir)? {
                patterns.insert(stem(&path), read_json(&path)?);
            }
            for sub in sorted_entries(&patterns_dir)?.into_iter().filter(|p| p.is_dir()) {
                for path in json_files(&sub)? {
                    patterns.insert(stem(&path), read_json(&path)?);
                }
            }
            root.insert(PATTERNS_DIR.into(), JsonValue::Object(patterns));
        }

        let domains_dir = dir.join(DOMAINS_DIR);
        if domains_dir.is_dir() {
            let mut domains = Map::new();
            for path in json_files(&domains_dir)? {
                let data = read_json(&path)?;
                let name = data
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| stem(&path));
                domains.insert(name, data);
            }
            root.insert(DOMAINS_DIR.into(), JsonValue::Object(domains));
        }

        let messy_dir = dir.join(MESSY_DIR);
        if messy_dir.is_dir() {
            let mut messy = Map::new();
            for path in json_files(&messy_dir)? {
                messy.insert(stem(&path), read_json(&path)?);
            }
            root.insert(MESSY_DIR.into(), JsonValue::Object(messy));
        }

        tracing::info!(files = root.len(), dir = %dir.display(), "Loaded vocabulary");
        Ok(Self { root })
    }

    /// Look up a dotted path such as `names.pronouns.male`.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let mut parts = path.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_list(&self, path: &str) -> Option<&Vec<JsonValue>> {
        self.get(path).and_then(JsonValue::as_array).filter(|l| !l.is_empty())
    }

    /// One random item from the list at `path`.
    pub fn random<R: Rng + ?Sized>(&self, path: &str, rng: &mut R) -> Option<&JsonValue> {
        self.get_list(path)?.choose(rng)
    }

    /// Up to `k` distinct items from the list at `path`.
    pub fn sample<R: Rng + ?Sized>(&self, path: &str, k: usize, rng: &mut R) -> Vec<JsonValue> {
        match self.get_list(path) {
            Some(items) => items.choose_multiple(rng, k.min(items.len())).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn top_level_keys(&self) -> Vec<String> {
        self.root.keys().cloned().collect()
    }

    pub fn domain_names(&self) -> Vec<String> {
        self.get(DOMAINS_DIR)
            .and_then(JsonValue::as_object)
            .map(|domains| domains.keys().cloned().collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    /// Template list for a pattern: the explicit variant when present, else
    /// the `templates` key. A pattern stored as a bare list is returned as is.
    pub fn pattern_templates(&self, pattern: &str, variant: Option<&str>) -> Option<&JsonValue> {
        let data = self.get(&format!("{}.{}", PATTERNS_DIR, pattern))?;
        let templates = match data {
            JsonValue::Object(map) => variant
                .and_then(|v| map.get(v))
                .or_else(|| map.get("templates"))?,
            other => other,
        };
        match templates {
            JsonValue::Array(list) if list.is_empty() => None,
            JsonValue::Null => None,
            other => Some(other),
        }
    }

    pub fn has_pattern_key(&self, pattern: &str, key: &str) -> bool {
        self.get(&format!("{}.{}", PATTERNS_DIR, pattern))
            .and_then(JsonValue::as_object)
            .is_some_and(|map| map.contains_key(key))
    }

    /// Pick one raw (unfilled) template for a pattern, honouring weights.
    pub fn pattern<R: Rng + ?Sized>(&self, pattern: &str, variant: Option<&str>, rng: &mut R) -> Option<String> {
        self.pattern_templates(pattern, variant)
            .and_then(|templates| select_weighted(templates, rng))
    }

    // =========================================================================
    // People
    // =========================================================================

    /// A random person: male/female/neutral weighted 45/45/10.
    pub fn person_with_pronouns<R: Rng + ?Sized>(&self, rng: &mut R) -> Person {
        let gender = pick_gender(rng);
        let name = self
            .random(&format!("names.{}", gender), rng)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let pronouns = self.get(&format!("names.pronouns.{}", gender));

        match (name, pronouns) {
            (Some(name), Some(pronouns)) => {
                let verb_s = if gender == "neutral" { "" } else { "s" };
                Person::with_pronouns(name, Some(pronouns), verb_s)
            }
            _ => Person::fallback(),
        }
    }

    /// A person drawn from `messy.names_diverse`, falling back to
    /// [`Vocab::person_with_pronouns`] when that list is missing.
    pub fn diverse_person<R: Rng + ?Sized>(&self, rng: &mut R) -> Person {
        let gender = if rng.gen_bool(0.5) { "male" } else { "female" };
        let name = self
            .random(&format!("{}.names_diverse.{}", MESSY_DIR, gender), rng)
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let Some(name) = name else {
            return self.person_with_pronouns(rng);
        };
        let pronouns = self.get(&format!("names.pronouns.{}", gender));
        let subject = pronouns
            .and_then(|p| p.get("subject"))
            .and_then(JsonValue::as_str)
            .unwrap_or("they");
        let verb_s = if subject == "they" { "" } else { "s" };
        Person::with_pronouns(name, pronouns, verb_s)
    }

    pub fn with_article(word: &str) -> String {
        transforms::with_article(word)
    }
}

fn pick_gender<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    GENDERS
        .choose_weighted(rng, |(_, weight)| *weight)
        .map(|(gender, _)| *gender)
        .unwrap_or("neutral")
}

/// Weighted choice over strings or `{"text", "weight"}` objects.
pub fn select_weighted<R: Rng + ?Sized>(templates: &JsonValue, rng: &mut R) -> Option<String> {
    let list = match templates {
        JsonValue::Array(list) => list,
        JsonValue::String(s) => return Some(s.clone()),
        other => return Some(other.to_string()),
    };

    let entries: Vec<(String, f64)> = list
        .iter()
        .map(|entry| match entry {
            JsonValue::Object(map) => (
                map.get("text").and_then(JsonValue::as_str).unwrap_or_default().to_string(),
                map.get("weight").and_then(JsonValue::as_f64).unwrap_or(1.0),
            ),
            JsonValue::String(s) => (s.clone(), 1.0),
            other => (other.to_string(), 1.0),
        })
        .collect();

    let weights = entries.iter().map(|(_, w)| w.max(0.0));
    match WeightedIndex::new(weights) {
        Ok(index) => Some(entries[index.sample(rng)].0.clone()),
        Err(_) => entries.choose(rng).map(|(text, _)| text.clone()),
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .map_err(|e| Error::vocab(format!("Cannot read {}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect())
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::vocab(format!("Cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::vocab(format!("Invalid JSON in {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vocab() -> Vocab {
        Vocab::from_value(json!({
            "names": {
                "male": ["Tom", "Raj"],
                "female": ["Ana", "Mei"],
                "neutral": ["Sam"],
                "pronouns": {
                    "male": {"subject": "he", "object": "him", "possessive": "his", "reflexive": "himself"},
                    "female": {"subject": "she", "object": "her", "possessive": "her", "reflexive": "herself"},
                    "neutral": {"subject": "they", "object": "them", "possessive": "their", "reflexive": "themselves"}
                }
            },
            "items": {"countable_singular": ["apple", "pear", "plum", "fig"]},
            "patterns": {
                "simple": {"templates": ["A ${x}"], "alt": [{"text": "B ${x}", "weight": 3}]},
                "bare": ["C ${x}"]
            },
            "messy": {"names_diverse": {"male": ["Oluwaseun"], "female": ["Siobhan"]}}
        }))
    }

    #[test]
    fn test_dotted_get() {
        let vocab = vocab();
        assert_eq!(vocab.get("names.pronouns.male.subject"), Some(&json!("he")));
        assert!(vocab.get("names.unknown").is_none());
        assert!(vocab.get("names.male.0").is_none());
    }

    #[test]
    fn test_sample_is_distinct() {
        let vocab = vocab();
        let mut rng = StdRng::seed_from_u64(2);
        let picked = vocab.sample("items.countable_singular", 3, &mut rng);
        let unique: std::collections::BTreeSet<String> = picked.iter().map(|v| v.to_string()).collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(vocab.sample("items.countable_singular", 10, &mut rng).len(), 4);
    }

    #[test]
    fn test_pattern_variant_lookup() {
        let vocab = vocab();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(vocab.pattern("simple", None, &mut rng).as_deref(), Some("A ${x}"));
        assert_eq!(vocab.pattern("simple", Some("alt"), &mut rng).as_deref(), Some("B ${x}"));
        assert_eq!(vocab.pattern("simple", Some("missing"), &mut rng).as_deref(), Some("A ${x}"));
        assert_eq!(vocab.pattern("bare", None, &mut rng).as_deref(), Some("C ${x}"));
        assert!(vocab.pattern("nope", None, &mut rng).is_none());
    }

    #[test]
    fn test_weighted_selection_respects_zero_weight() {
        let mut rng = StdRng::seed_from_u64(9);
        let templates = json!([{"text": "never", "weight": 0}, {"text": "always", "weight": 2}]);
        for _ in 0..20 {
            assert_eq!(select_weighted(&templates, &mut rng).as_deref(), Some("always"));
        }
    }

    #[test]
    fn test_person_pronouns_agree() {
        let vocab = vocab();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let person = vocab.person_with_pronouns(&mut rng);
            match person.subject.as_str() {
                "he" => assert!(["Tom", "Raj"].contains(&person.name.as_str())),
                "she" => assert!(["Ana", "Mei"].contains(&person.name.as_str())),
                _ => {
                    assert_eq!(person.name, "Sam");
                    assert_eq!(person.verb_s, "");
                }
            }
        }
    }

    #[test]
    fn test_person_fallback_and_diverse() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(Vocab::default().person_with_pronouns(&mut rng), Person::fallback());

        let person = vocab().diverse_person(&mut rng);
        assert!(["Oluwaseun", "Siobhan"].contains(&person.name.as_str()));
        assert_eq!(person.verb_s, "s");
    }

    #[test]
    fn test_load_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("names.json"), r#"{"male": ["Tom"]}"#).unwrap();
        fs::create_dir_all(root.join("patterns/arithmetic")).unwrap();
        fs::write(root.join("patterns/arithmetic/add.json"), r#"{"templates": ["x"]}"#).unwrap();
        fs::create_dir_all(root.join("domains")).unwrap();
        fs::write(root.join("domains/k.json"), r#"{"name": "kitchen", "items": ["pie"]}"#).unwrap();

        let vocab = Vocab::load(root).unwrap();
        assert_eq!(vocab.get("names.male"), Some(&json!(["Tom"])));
        assert!(vocab.get("patterns.add.templates").is_some());
        assert_eq!(vocab.domain_names(), vec!["kitchen".to_string()]);
    }

    #[test]
    fn test_load_missing_dir() {
        assert!(matches!(Vocab::load("/nonexistent/vocab"), Err(Error::Vocab(_))));
    }
}
