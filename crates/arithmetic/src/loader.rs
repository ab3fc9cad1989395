//! Schema loading and composition.
//!
//! Schemas live in a directory tree: `*.json` at the root or one folder per
//! expert type (`arithmetic/`, `percentage/`, ...). Two folders are special:
//! `bases/` holds parents for `extends` and `mixins/` holds fragments for
//! `mixins`. Neither is loaded as a schema on its own.

use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use virtual_expert_core::{Error, Result};

use crate::schema::SchemaSpec;

const MIXINS_DIR: &str = "mixins";
const BASES_DIR: &str = "bases";

/// Directory entries sorted by path.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .map_err(|e| Error::schema_load(format!("Cannot read {}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn is_json(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "json")
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::schema_load(format!("Cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::schema_load(format!("Invalid JSON in {}: {}", path.display(), e)))
}

/// Deep merge `overlay` into `base`: objects merge key by key, anything
/// else (arrays included) is replaced.
pub fn deep_merge(base: &mut JsonValue, overlay: JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_object() && base_map.get(&key).is_some_and(JsonValue::is_object);
                match base_map.get_mut(&key) {
                    Some(existing) if nested => deep_merge(existing, value),
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// =============================================================================
// Composer
// =============================================================================

/// Resolves `extends` and `mixins`.
///
/// Merge order: the base (itself composed), then each mixin in order, then
/// the schema's own keys. Later layers win.
pub struct SchemaComposer {
    schema_dir: PathBuf,
    mixin_cache: HashMap<String, JsonValue>,
    base_cache: HashMap<String, JsonValue>,
}

impl SchemaComposer {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            mixin_cache: HashMap::new(),
            base_cache: HashMap::new(),
        }
    }

    pub fn compose(&mut self, schema: &JsonValue) -> Result<JsonValue> {
        let own_name = schema
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        let mut chain = vec![own_name];
        self.compose_with(schema, &mut chain)
    }

    fn compose_with(&mut self, schema: &JsonValue, chain: &mut Vec<String>) -> Result<JsonValue> {
        let object = schema
            .as_object()
            .ok_or_else(|| Error::composition("schema must be a JSON object"))?;

        let mut result = JsonValue::Object(Map::new());

        if let Some(extends) = object.get("extends") {
            let base_name = extends
                .as_str()
                .ok_or_else(|| Error::composition("'extends' must be a string"))?;
            let mut base = self.load_base(base_name, chain)?;
            // Being abstract is not inherited.
            if let Some(map) = base.as_object_mut() {
                map.remove("abstract");
            }
            deep_merge(&mut result, base);
        }

        if let Some(mixins) = object.get("mixins") {
            let names = mixins
                .as_array()
                .ok_or_else(|| Error::composition("'mixins' must be a list"))?;
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| Error::composition("mixin names must be strings"))?;
                let mixin = self.load_mixin(name)?;
                deep_merge(&mut result, mixin);
            }
        }

        let mut own = object.clone();
        own.remove("extends");
        own.remove("mixins");
        deep_merge(&mut result, JsonValue::Object(own));

        Ok(result)
    }

    fn load_mixin(&mut self, name: &str) -> Result<JsonValue> {
        if let Some(cached) = self.mixin_cache.get(name) {
            return Ok(cached.clone());
        }

        let path = self.schema_dir.join(MIXINS_DIR).join(format!("{}.json", name));
        if !path.is_file() {
            return Err(Error::composition(format!("Mixin not found: {}", name)));
        }
        let mixin = read_json(&path)?;
        self.mixin_cache.insert(name.to_string(), mixin.clone());
        Ok(mixin)
    }

    fn load_base(&mut self, name: &str, chain: &mut Vec<String>) -> Result<JsonValue> {
        if let Some(cached) = self.base_cache.get(name) {
            return Ok(cached.clone());
        }
        if chain.iter().any(|n| n == name) {
            return Err(Error::composition(format!(
                "Inheritance cycle: {} -> {}",
                chain.join(" -> "),
                name
            )));
        }

        let path = self
            .find_base(name)?
            .ok_or_else(|| Error::composition(format!("Base schema not found: {}", name)))?;
        let raw = read_json(&path)?;

        chain.push(name.to_string());
        let composed = self.compose_with(&raw, chain);
        chain.pop();
        let composed = composed?;

        tracing::debug!(base = %name, path = %path.display(), "Composed base schema");
        self.base_cache.insert(name.to_string(), composed.clone());
        Ok(composed)
    }

    fn find_base(&self, name: &str) -> Result<Option<PathBuf>> {
        let file = format!("{}.json", name);

        let in_bases = self.schema_dir.join(BASES_DIR).join(&file);
        if in_bases.is_file() {
            return Ok(Some(in_bases));
        }

        let at_root = self.schema_dir.join(&file);
        if at_root.is_file() {
            return Ok(Some(at_root));
        }

        for dir in sorted_entries(&self.schema_dir)? {
            if !dir.is_dir() || is_special_dir(&dir) {
                continue;
            }
            let candidate = dir.join(&file);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    pub fn list_mixins(&self) -> Vec<String> {
        list_stems(&self.schema_dir.join(MIXINS_DIR))
    }

    pub fn list_bases(&self) -> Vec<String> {
        list_stems(&self.schema_dir.join(BASES_DIR))
    }

    pub fn clear_cache(&mut self) {
        self.mixin_cache.clear();
        self.base_cache.clear();
    }
}

fn is_special_dir(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == MIXINS_DIR || name == BASES_DIR)
}

fn list_stems(dir: &Path) -> Vec<String> {
    sorted_entries(dir)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| is_json(p))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect()
}

// =============================================================================
// Loader
// =============================================================================

/// Loads, composes and validates schemas from a directory.
pub struct SchemaLoader {
    schema_dir: PathBuf,
    composer: SchemaComposer,
}

impl SchemaLoader {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        let schema_dir = schema_dir.into();
        Self {
            composer: SchemaComposer::new(schema_dir.clone()),
            schema_dir,
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Every schema file: root `*.json`, then expert folders, sorted.
    fn schema_files(&self) -> Result<Vec<PathBuf>> {
        if !self.schema_dir.is_dir() {
            return Err(Error::schema_load(format!(
                "Schema directory not found: {}",
                self.schema_dir.display()
            )));
        }

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for path in sorted_entries(&self.schema_dir)? {
            if is_json(&path) {
                files.push(path);
            } else if path.is_dir() && !is_special_dir(&path) {
                dirs.push(path);
            }
        }
        for dir in dirs {
            files.extend(sorted_entries(&dir)?.into_iter().filter(|p| is_json(p)));
        }
        Ok(files)
    }

    /// Load every schema. Any malformed schema fails the whole load.
    pub fn load_all(&mut self) -> Result<BTreeMap<String, SchemaSpec>> {
        let mut schemas = BTreeMap::new();

        for path in self.schema_files()? {
            let spec = self.load_file(&path)?;
            if schemas.contains_key(&spec.name) {
                return Err(Error::schema_load(format!(
                    "Duplicate schema name '{}' in {}",
                    spec.name,
                    path.display()
                )));
            }
            schemas.insert(spec.name.clone(), spec);
        }

        tracing::info!(
            count = schemas.len(),
            dir = %self.schema_dir.display(),
            "Loaded schemas"
        );
        Ok(schemas)
    }

    /// Load one schema by name: file stem first, then the `name` field.
    pub fn load(&mut self, name: &str) -> Result<SchemaSpec> {
        let files = self.schema_files()?;
        let stem_match = files
            .iter()
            .find(|p| p.file_stem().is_some_and(|s| s == name));
        if let Some(path) = stem_match {
            return self.load_file(path);
        }

        for path in &files {
            let raw = read_json(path)?;
            if raw.get("name").and_then(JsonValue::as_str) == Some(name) {
                return self.build(raw, path);
            }
        }
        Err(Error::schema_load(format!("Schema not found: {}", name)))
    }

    pub fn load_file(&mut self, path: &Path) -> Result<SchemaSpec> {
        let raw = read_json(path)?;
        self.build(raw, path)
    }

    fn build(&mut self, raw: JsonValue, path: &Path) -> Result<SchemaSpec> {
        let needs_compose = raw.get("extends").is_some() || raw.get("mixins").is_some();
        let composed = if needs_compose {
            self.composer.compose(&raw)?
        } else {
            raw
        };

        SchemaSpec::from_value(composed).map_err(|e| match e {
            Error::SchemaLoad(msg) => Error::schema_load(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn composer(&self) -> &SchemaComposer {
        &self.composer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_objects_and_replace_arrays() {
        let mut base = json!({
            "variables": {"a": {"min": 1, "max": 5}, "b": {"min": 2}},
            "trace": [1, 2, 3],
            "answer": "a"
        });
        deep_merge(
            &mut base,
            json!({
                "variables": {"a": {"max": 50}, "c": {"min": 0}},
                "trace": [9],
            }),
        );

        assert_eq!(base["variables"]["a"], json!({"min": 1, "max": 50}));
        assert_eq!(base["variables"]["c"], json!({"min": 0}));
        assert_eq!(base["trace"], json!([9]));
        assert_eq!(base["answer"], json!("a"));

        let keys: Vec<_> = base["variables"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_mixin_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut composer = SchemaComposer::new(dir.path());
        let result = composer.compose(&json!({"name": "x", "mixins": ["nope"]}));
        assert!(matches!(result, Err(Error::Composition(_))));
    }
}
