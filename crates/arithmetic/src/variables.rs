//! Variable sampling.

use rand::Rng;
use std::collections::BTreeMap;

use virtual_expert_core::{Difficulty, Value};

use crate::expression;
use crate::perturbation::NumericDiversifier;
use crate::schema::{OrderedMap, VariableKind, VariableSpec};

/// Sampled variables by name.
pub type VariableMap = BTreeMap<String, Value>;

const EASY_VALUES: [i64; 6] = [5, 10, 15, 20, 25, 30];

/// Draws variable values from a caller-supplied RNG.
#[derive(Debug, Clone, Default)]
pub struct VariableGenerator {
    /// Applied to `int` variables that do not declare a difficulty.
    default_difficulty: Option<Difficulty>,
}

impl VariableGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self {
            default_difficulty: (difficulty != Difficulty::Medium).then_some(difficulty),
        }
    }

    /// Sample every variable in declaration order.
    pub fn generate<R: Rng + ?Sized>(&self, specs: &OrderedMap<VariableSpec>, rng: &mut R) -> VariableMap {
        let mut variables: VariableMap = specs
            .iter()
            .map(|(name, spec)| (name.to_string(), self.generate_one(spec, rng)))
            .collect();

        self.apply_digit_pairs(specs, &mut variables, rng);
        variables
    }

    pub fn generate_one<R: Rng + ?Sized>(&self, spec: &VariableSpec, rng: &mut R) -> Value {
        match spec.kind {
            VariableKind::Int => Value::Int(self.generate_int(spec, rng)),
            VariableKind::Float => Value::Float(generate_float(spec, rng)),
            VariableKind::Bool => Value::Bool(rng.gen_bool(0.5)),
            VariableKind::Choice => {
                let options = spec.choices();
                if options.is_empty() {
                    return Value::Int(0);
                }
                let picked = &options[rng.gen_range(0..options.len())];
                Value::from_json(picked).unwrap_or_else(|| Value::Text(picked.to_string()))
            }
        }
    }

    fn generate_int<R: Rng + ?Sized>(&self, spec: &VariableSpec, rng: &mut R) -> i64 {
        let (min, max) = int_range(spec, 1, 100);

        let difficulty = spec.difficulty.or(self.default_difficulty);
        let mut value = match difficulty {
            Some(level) => by_difficulty(level, min, max, rng),
            None if spec.avoid_round => NumericDiversifier::avoid_round(rng, min, max),
            None => rng.gen_range(min..=max),
        };

        if let Some(step) = spec.multiple_of.filter(|m| *m > 0) {
            value = value.div_euclid(step) * step;
            if value < min {
                value += step;
            }
        }
        value
    }

    /// Replace flagged pairs so that adding them carries, or subtracting
    /// them borrows. Variables are paired in declaration order.
    fn apply_digit_pairs<R: Rng + ?Sized>(
        &self,
        specs: &OrderedMap<VariableSpec>,
        variables: &mut VariableMap,
        rng: &mut R,
    ) {
        for pair in flagged(specs, |s| s.requires_carrying).chunks(2) {
            if let [(a, spec_a), (b, spec_b)] = pair {
                let (min, max) = shared_range(spec_a, spec_b, 10, 99);
                let (x, y) = NumericDiversifier::carrying_pair(rng, min, max);
                variables.insert(a.to_string(), Value::Int(x));
                variables.insert(b.to_string(), Value::Int(y));
            }
        }

        for pair in flagged(specs, |s| s.requires_borrowing).chunks(2) {
            if let [(larger, spec_a), (smaller, spec_b)] = pair {
                let (min, max) = shared_range(spec_a, spec_b, 20, 99);
                let (x, y) = NumericDiversifier::borrowing_pair(rng, min, max);
                variables.insert(larger.to_string(), Value::Int(x));
                variables.insert(smaller.to_string(), Value::Int(y));
            }
        }
    }

    /// Evaluate derived expressions in order; later ones see earlier ones.
    ///
    /// A failing expression yields `0`.
    pub fn derive(derived: &OrderedMap<String>, variables: &mut VariableMap) {
        for (name, expr) in derived.iter() {
            let value = match expression::evaluate(expr, variables) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(variable = %name, expression = %expr, error = %e, "Derived expression failed, using 0");
                    Value::Int(0)
                }
            };
            variables.insert(name.to_string(), value);
        }
    }
}

fn flagged<'a>(
    specs: &'a OrderedMap<VariableSpec>,
    pick: fn(&VariableSpec) -> bool,
) -> Vec<(&'a str, &'a VariableSpec)> {
    specs
        .iter()
        .filter(|(_, spec)| spec.kind == VariableKind::Int && pick(spec))
        .collect()
}

fn int_range(spec: &VariableSpec, default_min: i64, default_max: i64) -> (i64, i64) {
    let min = spec.min.map_or(default_min, |m| m as i64);
    let max = spec.max.map_or(default_max, |m| m as i64);
    (min, max.max(min))
}

fn shared_range(a: &VariableSpec, b: &VariableSpec, default_min: i64, default_max: i64) -> (i64, i64) {
    let (min_a, max_a) = int_range(a, default_min, default_max);
    let (min_b, max_b) = int_range(b, default_min, default_max);
    let min = min_a.max(min_b);
    (min, max_a.min(max_b).max(min))
}

fn by_difficulty<R: Rng + ?Sized>(level: Difficulty, min: i64, max: i64, rng: &mut R) -> i64 {
    match level {
        Difficulty::Easy => {
            let valid: Vec<i64> = EASY_VALUES
                .iter()
                .copied()
                .filter(|v| (min..=max).contains(v))
                .collect();
            if !valid.is_empty() {
                return valid[rng.gen_range(0..valid.len())];
            }
            let value = rng.gen_range(min..=max);
            match value.div_euclid(5) * 5 {
                0 => value,
                rounded if rounded >= min => rounded,
                _ => value,
            }
        }
        Difficulty::Medium => rng.gen_range(min..=max),
        Difficulty::Hard => NumericDiversifier::avoid_round(rng, min.max(50), max.max(200)),
    }
}

fn generate_float<R: Rng + ?Sized>(spec: &VariableSpec, rng: &mut R) -> f64 {
    let min = spec.min.unwrap_or(0.0);
    let max = spec.max.unwrap_or(10.0).max(min);
    let precision = spec.precision.unwrap_or(2).clamp(0, 12);

    let value = if max > min { rng.gen_range(min..=max) } else { min };
    let scale = 10f64.powi(precision);
    (value * scale).round() / scale
}
