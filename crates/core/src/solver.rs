//! Trace solvers.
//!
//! A solver replays a typed trace step by step. Core steps (`init`, `given`,
//! `compute`, `formula`, `query`, `state`) are interpreted here for every
//! solver; anything else is handed to [`TraceSolver::execute_step`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::types::{Operand, TraceResult, TraceStep, Value};

/// Tolerance used for state assertions and answer rounding.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Round `value` to the nearest integer when it lies within `tolerance` of it.
pub fn snap_answer(value: f64, tolerance: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < tolerance {
        rounded
    } else {
        value
    }
}

/// Relative comparison, absolute below magnitude 1.
///
/// The generator's formula cross-check and the verifier's answer check both
/// go through here.
pub fn answers_agree(expected: f64, computed: f64, tolerance: f64) -> bool {
    let scale = expected.abs().max(computed.abs()).max(1.0);
    (expected - computed).abs() <= tolerance * scale
}

/// Variable state threaded through a trace.
#[derive(Debug, Clone, Default)]
pub struct TraceState {
    vars: BTreeMap<String, f64>,
    init_only: BTreeSet<String>,
}

impl TraceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Store a computed value.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        self.init_only.remove(&name);
        self.vars.insert(name, value);
    }

    /// Store a given value that has not been computed yet.
    pub fn init(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        self.init_only.insert(name.clone());
        self.vars.insert(name, value);
    }

    pub fn is_init_only(&self, name: &str) -> bool {
        self.init_only.contains(name)
    }

    /// Resolve an argument: literal, variable, or numeric string.
    pub fn resolve(&self, operand: &Operand) -> Result<f64> {
        match operand {
            Operand::Number(n) => Ok(*n),
            Operand::Name(name) => self
                .get(name)
                .or_else(|| name.trim().parse::<f64>().ok())
                .ok_or_else(|| Error::trace(format!("Variable not found: {}", name))),
        }
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.vars
    }

    pub fn into_values(self) -> BTreeMap<String, f64> {
        self.vars
    }
}

/// A virtual expert that executes solution traces.
#[async_trait]
pub trait TraceSolver: Send + Sync {
    /// Get the expert name (e.g. `arithmetic`).
    fn name(&self) -> &str;

    /// Get the human-readable description.
    fn description(&self) -> &str;

    fn tolerance(&self) -> f64 {
        DEFAULT_TOLERANCE
    }

    /// Execute a domain-specific step against the state.
    ///
    /// The default rejects every step: pure-arithmetic experts only need the
    /// core steps.
    fn execute_step(&self, step: &TraceStep, _state: &mut TraceState) -> Result<()> {
        Err(Error::trace(format!(
            "Unsupported step '{}' for expert '{}'",
            step.op_name(),
            self.name()
        )))
    }

    /// Replay a whole trace.
    fn execute_trace(&self, steps: &[TraceStep]) -> TraceResult {
        run_trace(self, steps)
    }

    /// Operation entry point. `params` is either `{"trace": [...]}` or the
    /// bare step list.
    async fn execute_operation(&self, operation: &str, params: JsonValue) -> Result<TraceResult> {
        match operation {
            "execute_trace" => {
                let raw = match params {
                    JsonValue::Object(mut map) => map
                        .remove("trace")
                        .ok_or_else(|| Error::invalid_request("missing 'trace' parameter"))?,
                    other => other,
                };
                let steps: Vec<TraceStep> = serde_json::from_value(raw)?;
                Ok(self.execute_trace(&steps))
            }
            other => Err(Error::invalid_request(format!(
                "Unknown operation '{}' for expert '{}'",
                other,
                self.name()
            ))),
        }
    }
}

/// Shared trace interpreter.
pub fn run_trace<S: TraceSolver + ?Sized>(solver: &S, steps: &[TraceStep]) -> TraceResult {
    let tolerance = solver.tolerance();
    let mut state = TraceState::new();
    let mut query_var: Option<String> = None;
    let mut steps_executed = 0;

    for (i, step) in steps.iter().enumerate() {
        if let Err(e) = run_step(solver, step, &mut state, &mut query_var, tolerance) {
            let message = match e {
                Error::Trace(msg) => msg,
                other => other.to_string(),
            };
            tracing::debug!(expert = %solver.name(), step = i, error = %message, "Trace step failed");
            return TraceResult {
                success: false,
                answer: None,
                state: state.into_values(),
                error: Some(format!("Step {}: {}", i, message)),
                expert: solver.name().to_string(),
                steps_executed,
            };
        }
        steps_executed += 1;
    }

    let answer = query_var
        .as_deref()
        .and_then(|var| state.get(var))
        .map(|value| snap_answer(value, tolerance));

    TraceResult {
        success: true,
        answer,
        state: state.into_values(),
        error: None,
        expert: solver.name().to_string(),
        steps_executed,
    }
}

fn run_step<S: TraceSolver + ?Sized>(
    solver: &S,
    step: &TraceStep,
    state: &mut TraceState,
    query_var: &mut Option<String>,
    tolerance: f64,
) -> Result<()> {
    match step {
        TraceStep::Init { var, value, .. } => {
            let number = match value {
                Value::Text(s) => s.trim().parse::<f64>().ok(),
                other => other.as_f64(),
            }
            .ok_or_else(|| Error::trace(format!("init value for '{}' is not numeric: {}", var, value)))?;
            state.init(var.clone(), number);
        }
        TraceStep::Given { values } => {
            for (name, value) in values {
                state.init(name.clone(), *value);
            }
        }
        TraceStep::Compute {
            compute_op,
            args,
            var,
        } => {
            let resolved = args
                .iter()
                .map(|a| state.resolve(a))
                .collect::<Result<Vec<_>>>()?;
            let result = compute_op.apply(&resolved)?;
            if let Some(var) = var {
                state.set(var.clone(), result);
            }
        }
        TraceStep::Formula { .. } => {}
        TraceStep::Query { var } => {
            if state.is_init_only(var) {
                return Err(Error::trace(format!(
                    "query targets init variable '{}', not a computed result",
                    var
                )));
            }
            *query_var = Some(var.clone());
        }
        TraceStep::State { assertions } => {
            for (name, expected) in assertions {
                let actual = state.get(name).unwrap_or(0.0);
                if (actual - expected).abs() > tolerance {
                    return Err(Error::trace(format!(
                        "state {}={}, expected {}",
                        name, actual, expected
                    )));
                }
            }
        }
        domain => {
            let before = state.values().clone();
            solver.execute_step(domain, state)?;
            let changed: Vec<String> = state
                .init_only
                .iter()
                .filter(|name| state.vars.get(*name) != before.get(*name))
                .cloned()
                .collect();
            for name in changed {
                state.init_only.remove(&name);
            }
        }
    }
    Ok(())
}
