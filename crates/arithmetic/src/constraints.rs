//! Cross-variable constraints with bounded regeneration.

use std::collections::BTreeSet;

use virtual_expert_core::Value;

use crate::expression;
use crate::schema::{ConstraintBounds, OrderedMap};
use crate::variables::VariableMap;

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Result of [`ConstraintValidator::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintOutcome {
    pub variables: VariableMap,
    /// Constraints still failing; empty when all hold.
    pub violated: Vec<String>,
    /// Regenerations performed.
    pub attempts: usize,
}

impl ConstraintOutcome {
    pub fn satisfied(&self) -> bool {
        self.violated.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstraintValidator {
    max_attempts: usize,
}

impl Default for ConstraintValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl ConstraintValidator {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Expressions that fail. An evaluation error counts as a failure.
    pub fn check(&self, constraints: &OrderedMap<ConstraintBounds>, variables: &VariableMap) -> Vec<String> {
        constraints
            .iter()
            .filter(|(expr, bounds)| !holds(expr, bounds, variables))
            .map(|(expr, _)| expr.to_string())
            .collect()
    }

    /// Regenerate until every constraint holds or the attempt budget runs
    /// out. The last sample is returned either way.
    pub fn apply<F>(
        &self,
        constraints: &OrderedMap<ConstraintBounds>,
        mut variables: VariableMap,
        mut regenerate: F,
    ) -> ConstraintOutcome
    where
        F: FnMut() -> VariableMap,
    {
        let mut violated = self.check(constraints, &variables);
        let mut attempts = 0;

        while !violated.is_empty() && attempts < self.max_attempts {
            variables = regenerate();
            attempts += 1;
            violated = self.check(constraints, &variables);
        }

        if !violated.is_empty() {
            tracing::warn!(
                attempts,
                violated = ?violated,
                "Constraints still violated, returning best effort"
            );
        }

        ConstraintOutcome {
            variables,
            violated,
            attempts,
        }
    }

    /// Parse and scope-check every constraint expression.
    pub fn validate_expressions(
        &self,
        constraints: &OrderedMap<ConstraintBounds>,
        available: &BTreeSet<String>,
    ) -> Vec<String> {
        constraints
            .keys()
            .flat_map(|expr| {
                expression::validate(expr, available)
                    .into_iter()
                    .map(move |e| format!("Constraint '{}': {}", expr, e))
            })
            .collect()
    }
}

/// Booleans must be true; numbers must sit inside the bounds.
fn holds(expr: &str, bounds: &ConstraintBounds, variables: &VariableMap) -> bool {
    match expression::evaluate(expr, variables) {
        Ok(Value::Bool(b)) => b && bounds.contains(if b { 1.0 } else { 0.0 }),
        Ok(value) => value.as_f64().is_some_and(|v| bounds.contains(v)),
        Err(e) => {
            tracing::debug!(constraint = %expr, error = %e, "Constraint failed to evaluate");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constraints(value: serde_json::Value) -> OrderedMap<ConstraintBounds> {
        serde_json::from_value(value).unwrap()
    }

    fn vars(a: i64, b: i64) -> VariableMap {
        let mut vars = VariableMap::new();
        vars.insert("a".into(), Value::Int(a));
        vars.insert("b".into(), Value::Int(b));
        vars
    }

    #[test]
    fn test_check_bounds_and_booleans() {
        let validator = ConstraintValidator::default();
        let c = constraints(json!({
            "a - b": {"min": 10},
            "a > b": {},
            "a / b": {"max": 5}
        }));

        assert!(validator.check(&c, &vars(30, 10)).is_empty());
        assert_eq!(validator.check(&c, &vars(15, 10)), vec!["a - b".to_string()]);
        assert_eq!(validator.check(&c, &vars(5, 0)).len(), 2);
    }

    #[test]
    fn test_apply_regenerates_until_satisfied() {
        let validator = ConstraintValidator::new(10);
        let c = constraints(json!({"a - b": {"min": 10}}));
        let mut draws = vec![vars(50, 3), vars(12, 9), vars(11, 8)];

        let outcome = validator.apply(&c, vars(1, 1), || draws.pop().unwrap());
        assert!(outcome.satisfied());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.variables, vars(50, 3));
    }

    #[test]
    fn test_apply_best_effort() {
        let validator = ConstraintValidator::new(4);
        let c = constraints(json!({"a - b": {"min": 100}}));
        let mut calls = 0;

        let outcome = validator.apply(&c, vars(1, 1), || {
            calls += 1;
            vars(calls, 0)
        });
        assert!(!outcome.satisfied());
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.variables, vars(4, 0));
        assert_eq!(outcome.violated, vec!["a - b".to_string()]);
    }

    #[test]
    fn test_no_constraints_no_regeneration() {
        let outcome = ConstraintValidator::default().apply(&OrderedMap::new(), vars(1, 2), || unreachable!());
        assert!(outcome.satisfied());
        assert_eq!(outcome.attempts, 0);
    }

    #[test]
    fn test_validate_expressions() {
        let c = constraints(json!({"a - z": {"min": 0}}));
        let available: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        let errors = ConstraintValidator::default().validate_expressions(&c, &available);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Constraint 'a - z'"));
    }
}
