//! Placeholder substitution and number wording.

use rand::Rng;
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::resolver::TemplateVars;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder pattern is valid"))
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+\b").expect("integer pattern is valid"))
}

/// Replace every `${name}` that has a value; unknown names stay as written.
pub fn fill(template: &str, vars: &TemplateVars) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of `${...}` placeholders left in `text`, in order of appearance.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    placeholder_re()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Every placeholder name in a template.
pub fn placeholders(template: &str) -> Vec<String> {
    unresolved_placeholders(template)
}

/// Spelled-out forms for small numbers and round tens.
pub fn number_word(n: u64) -> Option<&'static str> {
    const ONES: [&str; 21] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
        "nineteen", "twenty",
    ];
    match n {
        1..=20 => Some(ONES[n as usize]),
        25 => Some("twenty-five"),
        30 => Some("thirty"),
        40 => Some("forty"),
        50 => Some("fifty"),
        60 => Some("sixty"),
        70 => Some("seventy"),
        80 => Some("eighty"),
        90 => Some("ninety"),
        100 => Some("one hundred"),
        _ => None,
    }
}

/// Randomly spells out standalone integers.
pub struct WordNumbers;

impl WordNumbers {
    /// Each eligible number is converted with probability `prob`. Prices
    /// (`$5`), decimals (`2.5`) and numbers directly before a period are
    /// left alone.
    pub fn apply<R: Rng + ?Sized>(text: &str, prob: f64, rng: &mut R) -> String {
        if prob <= 0.0 {
            return text.to_string();
        }
        let prob = prob.min(1.0);

        integer_re()
            .replace_all(text, |caps: &Captures| {
                let m = match caps.get(0) {
                    Some(m) => m,
                    None => return String::new(),
                };
                let digits = m.as_str();

                let before = text[..m.start()].chars().next_back();
                let after = text[m.end()..].chars().next();
                let attached = matches!(before, Some(c) if c.is_ascii_digit() || c == '.' || c == '$')
                    || matches!(after, Some(c) if c.is_ascii_digit() || c == '.');
                if attached {
                    return digits.to_string();
                }

                match digits.parse::<u64>().ok().and_then(number_word) {
                    Some(word) if rng.gen_bool(prob) => word.to_string(),
                    _ => digits.to_string(),
                }
            })
            .into_owned()
    }
}
