//! Text perturbation and numeric diversity.
//!
//! Generated problems share a small set of templates. Perturbation breaks
//! up the most visible regularities (openers, question phrasing, common
//! verbs) without touching numbers or names.

use rand::seq::SliceRandom;
use rand::Rng;

/// Empty entries weight the draw toward no filler.
const FILLER_PHRASES: [&str; 12] = [
    "As it turns out, ",
    "Interestingly, ",
    "Now, ",
    "Here's the situation: ",
    "Consider this: ",
    "So, ",
    "Well, ",
    "Actually, ",
    "You see, ",
    "",
    "",
    "",
];

const QUESTION_STARTERS: [(&str, &[&str]); 3] = [
    (
        "How many",
        &[
            "How many",
            "What is the total number of",
            "Find the number of",
            "Calculate how many",
            "Determine how many",
            "What's the count of",
        ],
    ),
    (
        "How much",
        &[
            "How much",
            "What is the total amount of",
            "Find the amount of",
            "Calculate the total",
            "What's the total",
        ],
    ),
    (
        "What is",
        &["What is", "What's", "Find", "Calculate", "Determine", "Figure out"],
    ),
];

const SYNONYMS: [(&str, &[&str]); 10] = [
    ("has", &["owns", "possesses", "holds"]),
    ("gets", &["receives", "obtains", "acquires"]),
    ("gives", &["hands", "passes", "transfers"]),
    ("buys", &["purchases", "gets", "picks up"]),
    ("sells", &["trades", "exchanges"]),
    ("makes", &["creates", "produces", "crafts"]),
    ("total", &["altogether", "in all", "combined"]),
    ("each", &["every", "per", "apiece"]),
    ("more", &["additional", "extra"]),
    ("left", &["remaining", "left over"]),
];

/// Sentence openers that can be lowercased after a filler phrase. Anything
/// else may be a name and keeps its capital.
const LOWERABLE_OPENERS: [&str; 12] = [
    "A", "An", "The", "There", "Each", "Every", "In", "On", "At", "If", "After", "During",
];

const SYNONYM_WORD_PROB: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePerturbator;

impl TemplatePerturbator {
    pub fn new() -> Self {
        Self
    }

    /// Apply random perturbations; `level` is the per-kind probability.
    pub fn perturb<R: Rng + ?Sized>(&self, text: &str, level: f64, rng: &mut R) -> String {
        if level <= 0.0 || text.is_empty() {
            return text.to_string();
        }
        let level = level.min(1.0);

        let mut result = text.to_string();
        if rng.gen_bool(level) {
            result = add_filler(&result, rng);
        }
        if rng.gen_bool(level) {
            result = vary_question(&result, rng);
        }
        if rng.gen_bool(level * 0.5) {
            result = substitute_synonyms(&result, rng);
        }
        result
    }
}

fn add_filler<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let filler = FILLER_PHRASES.choose(rng).copied().unwrap_or_default();
    if filler.is_empty() || !text.starts_with(|c: char| c.is_uppercase()) {
        return text.to_string();
    }

    let first_word = text.split_whitespace().next().unwrap_or_default();
    if LOWERABLE_OPENERS.contains(&first_word) {
        let mut chars = text.chars();
        let head: String = chars.next().map(|c| c.to_lowercase().collect()).unwrap_or_default();
        format!("{}{}{}", filler, head, chars.as_str())
    } else {
        format!("{}{}", filler, text)
    }
}

fn vary_question<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    for (original, variations) in QUESTION_STARTERS {
        if text.contains(original) {
            let replacement = variations.choose(rng).copied().unwrap_or(original);
            return text.replacen(original, replacement, 1);
        }
    }
    text.to_string()
}

fn substitute_synonyms<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    text.split_whitespace()
        .map(|word| {
            let core = word.trim_end_matches(&['.', ',', '?', '!'][..]);
            let punct = &word[core.len()..];
            let lower = core.to_lowercase();

            let Some((_, options)) = SYNONYMS.iter().find(|(w, _)| *w == lower) else {
                return word.to_string();
            };
            if !rng.gen_bool(SYNONYM_WORD_PROB) {
                return word.to_string();
            }

            let synonym = options.choose(rng).copied().unwrap_or(core);
            if core.starts_with(|c: char| c.is_uppercase()) {
                format!("{}{}", capitalize_first(synonym), punct)
            } else {
                format!("{}{}", synonym, punct)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Numeric Diversity
// =============================================================================

const PAIR_ATTEMPTS: usize = 200;

/// Numbers that exercise carrying, borrowing, and non-round operands.
pub struct NumericDiversifier;

impl NumericDiversifier {
    /// Two numbers whose ones digits sum to 10 or more.
    pub fn carrying_pair<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> (i64, i64) {
        let max = max.max(min);
        let mut pair = (min, max);
        for _ in 0..PAIR_ATTEMPTS {
            pair = (rng.gen_range(min..=max), rng.gen_range(min..=max));
            if pair.0.rem_euclid(10) + pair.1.rem_euclid(10) >= 10 {
                break;
            }
        }
        pair
    }

    /// `(larger, smaller)` where the smaller number has the larger ones
    /// digit, so `larger - smaller` borrows.
    pub fn borrowing_pair<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> (i64, i64) {
        let max = max.max(min);
        let smaller_min = (min / 2).max(1);
        let mut pair = (max, smaller_min);
        for _ in 0..PAIR_ATTEMPTS {
            let larger = rng.gen_range(min..=max);
            if larger - 1 <= smaller_min {
                continue;
            }
            let smaller = rng.gen_range(smaller_min..=larger - 1);
            pair = (larger, smaller);
            if smaller.rem_euclid(10) > larger.rem_euclid(10) {
                break;
            }
        }
        pair
    }

    /// A number that is not a multiple of 10, when the range allows one.
    pub fn avoid_round<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> i64 {
        let max = max.max(min);
        for _ in 0..10 {
            let value = rng.gen_range(min..=max);
            if value % 10 != 0 {
                return value;
            }
        }

        let mut value = rng.gen_range(min..=max);
        if value % 10 == 0 {
            value = (value + rng.gen_range(1..=9)).min(max);
            if value % 10 == 0 {
                value = (value - 1).max(min);
            }
        }
        value
    }
}
