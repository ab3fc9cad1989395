//! Text transforms for template variables (`item|pluralize`).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use virtual_expert_core::{Error, Result};

/// A transform over rendered text.
pub type TransformFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Named transforms available to pipe syntax.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("TransformRegistry").field("transforms", &names).finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("pluralize", pluralize);
        registry.register("singularize", singularize);
        registry.register("capitalize", capitalize);
        registry.register("lower", |s: &str| s.to_lowercase());
        registry.register("upper", |s: &str| s.to_uppercase());
        registry.register("with_article", with_article);
        registry.register("has_have", |s: &str| verb_form(s, "has", "have"));
        registry.register("does_do", |s: &str| verb_form(s, "does", "do"));
        registry.register("ordinal", ordinal);
        registry.register("money", money);
        registry
    }
}

impl TransformRegistry {
    /// Registry with the built-in transforms.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Register or replace a transform.
    pub fn register<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(transform));
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.transforms.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.transforms.keys().cloned().collect()
    }

    pub fn apply(&self, value: &str, name: &str) -> Result<String> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| Error::transform(format!("Unknown transform: {}", name)))?;
        Ok(transform(value))
    }

    pub fn apply_chain<'a>(&self, value: &str, names: impl IntoIterator<Item = &'a str>) -> Result<String> {
        let mut current = value.to_string();
        for name in names {
            current = self.apply(&current, name)?;
        }
        Ok(current)
    }
}

// =============================================================================
// Built-ins
// =============================================================================

pub fn pluralize(word: &str) -> String {
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{}es", word);
    }
    let mut chars = word.chars().rev();
    if let (Some('y'), Some(before)) = (chars.next(), chars.next()) {
        if !"aeiou".contains(before) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{}s", word)
}

pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if let Some(stem) = word.strip_suffix("es") {
        if stem.ends_with(['s', 'x', 'h']) {
            return stem.to_string();
        }
    }
    if let Some(stem) = word.strip_suffix('s') {
        if !word.ends_with("ss") {
            return stem.to_string();
        }
    }
    word.to_string()
}

/// `singular` when the verb suffix is `"s"`.
fn verb_form(verb_s: &str, singular: &str, plural: &str) -> String {
    if verb_s == "s" {
        singular.to_string()
    } else {
        plural.to_string()
    }
}

/// First letter upper case, the rest lower case.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// `a` or `an` by the first letter.
pub fn a_an(word: &str) -> &'static str {
    match word.chars().next() {
        Some(c) if "aeiouAEIOU".contains(c) => "an",
        _ => "a",
    }
}

pub fn with_article(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    format!("{} {}", a_an(word), word)
}

pub fn ordinal(value: &str) -> String {
    let Ok(n) = value.trim().parse::<i64>() else {
        return value.to_string();
    };
    let suffix = if (10..=20).contains(&n.rem_euclid(100)) {
        "th"
    } else {
        match n.rem_euclid(10) {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{}{}", n, suffix)
}

/// Two decimals for fractional amounts, none for whole ones.
pub fn money(value: &str) -> String {
    let Ok(amount) = value.trim().parse::<f64>() else {
        return value.to_string();
    };
    if amount.fract() == 0.0 && amount.abs() < 9.0e15 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize_and_singularize() {
        assert_eq!(pluralize("apple"), "apples");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("peach"), "peaches");
        assert_eq!(pluralize("berry"), "berries");
        assert_eq!(pluralize("toy"), "toys");

        assert_eq!(singularize("berries"), "berry");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("apples"), "apple");
        assert_eq!(singularize("glass"), "glass");
    }

    #[test]
    fn test_articles_and_ordinals() {
        assert_eq!(with_article("apple"), "an apple");
        assert_eq!(with_article("pear"), "a pear");
        assert_eq!(ordinal("1"), "1st");
        assert_eq!(ordinal("12"), "12th");
        assert_eq!(ordinal("23"), "23rd");
        assert_eq!(ordinal("many"), "many");
    }

    #[test]
    fn test_registry_chain_and_custom() {
        let mut registry = TransformRegistry::new();
        assert_eq!(
            registry.apply_chain("cherry", ["pluralize", "capitalize"]).unwrap(),
            "Cherries"
        );

        registry.register("shout", |s: &str| format!("{}!", s.to_uppercase()));
        assert_eq!(registry.apply("hey", "shout").unwrap(), "HEY!");

        assert!(matches!(
            registry.apply("x", "reverse"),
            Err(Error::Transform(_))
        ));
        assert!(registry.unregister("shout"));
        assert!(!registry.contains("shout"));
    }

    #[test]
    fn test_money() {
        assert_eq!(money("2.5"), "2.50");
        assert_eq!(money("3.75"), "3.75");
        assert_eq!(money("12"), "12");
        assert_eq!(money("lots"), "lots");
    }

    #[test]
    fn test_verb_helpers() {
        let registry = TransformRegistry::new();
        assert_eq!(registry.apply("s", "has_have").unwrap(), "has");
        assert_eq!(registry.apply("", "does_do").unwrap(), "do");
    }
}
