//! Trace verification with graduated rewards.
//!
//! A model answers with YAML:
//!
//! ```yaml
//! expert: arithmetic
//! trace:
//!   - {op: init, var: price, value: 12}
//!   - {op: compute, compute_op: mul, args: [price, 3], var: total}
//!   - {op: query, var: total}
//! ```
//!
//! The verifier dispatches the trace to the named expert and scores it.
//! A list of `{expert, trace}` sub-traces, either as the whole document or
//! under `trace`, is run by the [`CompositionSolver`] against the same
//! registry.

use serde_json::Value as JsonValue;
use std::sync::Arc;

use virtual_expert_core::config::DEFAULT_ANSWER_TOLERANCE;
use virtual_expert_core::{
    answers_agree, snap_answer, CompositionSolver, Error, Result, SolverRegistry, TraceExample,
    TraceResult, TraceSolver, TraceStep, VerificationResult, COMPOSED_EXPERT, DEFAULT_TOLERANCE,
};

use crate::experts::default_solvers;

const UNKNOWN_EXPERT: &str = "unknown";

/// Solvers by name, shared across verification tasks.
pub struct TraceVerifier {
    registry: Arc<SolverRegistry>,
    composition: CompositionSolver,
    answer_tolerance: f64,
}

impl Default for TraceVerifier {
    fn default() -> Self {
        let verifier = Self::empty();
        for solver in default_solvers() {
            verifier.register(solver);
        }
        verifier
    }
}

impl TraceVerifier {
    /// A verifier with every arithmetic expert registered.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        let registry = Arc::new(SolverRegistry::new());
        Self {
            composition: CompositionSolver::new(registry.clone()),
            registry,
            answer_tolerance: DEFAULT_ANSWER_TOLERANCE,
        }
    }

    /// Relative tolerance used by [`TraceVerifier::verify_example`].
    pub fn with_answer_tolerance(mut self, tolerance: f64) -> Self {
        if tolerance.is_finite() && tolerance > 0.0 {
            self.answer_tolerance = tolerance;
        }
        self
    }

    pub fn answer_tolerance(&self) -> f64 {
        self.answer_tolerance
    }

    pub fn registry(&self) -> &Arc<SolverRegistry> {
        &self.registry
    }

    pub fn register(&self, solver: Arc<dyn TraceSolver>) {
        self.registry.register(solver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TraceSolver>> {
        self.registry.get(name)
    }

    pub fn experts(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Parse YAML and execute the trace.
    pub async fn execute_yaml(&self, yaml: &str) -> Result<TraceResult> {
        let parsed = parse_yaml(yaml)?;
        Ok(self.execute_parsed(parsed).await)
    }

    /// Score a YAML trace. `expected_expert` and `expected_answer` are
    /// optional checks; without an expected answer a clean run earns 0.7.
    ///
    /// Answers are compared relative to their magnitude (absolute below 1),
    /// after snapping a near-integral expected answer the way the solvers
    /// snap theirs.
    pub async fn verify(
        &self,
        yaml: &str,
        expected_answer: Option<f64>,
        expected_expert: Option<&str>,
        tolerance: f64,
    ) -> VerificationResult {
        let parsed = match parse_yaml(yaml) {
            Ok(parsed) => parsed,
            Err(e) => {
                return VerificationResult {
                    expected_answer,
                    ..VerificationResult::unparsable(format!("YAML parse error: {}", e))
                }
            }
        };
        let expert = parsed.expert().to_string();

        let base = VerificationResult {
            parsed: true,
            expert_correct: true,
            trace_valid: false,
            answer_correct: false,
            reward: VerificationResult::REWARD_UNPARSABLE,
            computed_answer: None,
            expected_answer,
            expert: Some(expert.clone()),
            error: None,
        };

        if let Some(wanted) = expected_expert.filter(|wanted| *wanted != expert) {
            return VerificationResult {
                expert_correct: false,
                reward: VerificationResult::REWARD_WRONG_EXPERT,
                error: Some(format!("Expected expert '{}', got '{}'", wanted, expert)),
                ..base
            };
        }

        let result = self.execute_parsed(parsed).await;
        if !result.success {
            return VerificationResult {
                reward: VerificationResult::REWARD_TRACE_FAILED,
                error: result.error,
                ..base
            };
        }

        let computed = result.answer;
        let Some(expected) = expected_answer else {
            return VerificationResult {
                trace_valid: true,
                reward: VerificationResult::REWARD_EXECUTED,
                computed_answer: computed,
                ..base
            };
        };

        let expected_snapped = snap_answer(expected, DEFAULT_TOLERANCE);
        let correct = computed.is_some_and(|c| answers_agree(expected_snapped, c, tolerance));
        VerificationResult {
            trace_valid: true,
            answer_correct: correct,
            reward: if correct {
                VerificationResult::REWARD_CORRECT
            } else {
                VerificationResult::REWARD_EXECUTED
            },
            computed_answer: computed,
            ..base
        }
    }

    /// Replay a generated example against its own answer and expert, with
    /// the same tolerance the generator cross-checked it with.
    pub async fn verify_example(&self, example: &TraceExample) -> VerificationResult {
        let doc = serde_json::json!({
            "expert": example.expert,
            "trace": example.trace,
        });
        let yaml = match serde_yaml::to_string(&doc) {
            Ok(yaml) => yaml,
            Err(e) => return VerificationResult::unparsable(e.to_string()),
        };
        self.verify(&yaml, Some(example.answer), Some(&example.expert), self.answer_tolerance)
            .await
    }

    async fn execute_parsed(&self, parsed: ParsedTrace) -> TraceResult {
        match parsed {
            ParsedTrace::Single { expert, steps } => self.execute_steps(&expert, steps).await,
            ParsedTrace::Composed { sub_traces, .. } => self.composition.execute(&sub_traces).await,
        }
    }

    async fn execute_steps(&self, expert: &str, steps: Vec<TraceStep>) -> TraceResult {
        let Some(solver) = self.get(expert) else {
            return TraceResult::failed(expert, format!("Expert '{}' not found in registry", expert));
        };

        let params = match serde_json::to_value(&steps) {
            Ok(trace) => serde_json::json!({ "trace": trace }),
            Err(e) => return TraceResult::failed(expert, e.to_string()),
        };
        match solver.execute_operation("execute_trace", params).await {
            Ok(result) => result,
            Err(e) => TraceResult::failed(expert, e.to_string()),
        }
    }
}

/// A parsed model answer.
#[derive(Debug)]
enum ParsedTrace {
    Single { expert: String, steps: Vec<TraceStep> },
    Composed { expert: String, sub_traces: Vec<JsonValue> },
}

impl ParsedTrace {
    fn expert(&self) -> &str {
        match self {
            ParsedTrace::Single { expert, .. } | ParsedTrace::Composed { expert, .. } => expert,
        }
    }
}

/// Every item is a `{expert, trace}` mapping rather than a step.
fn is_composed(items: &[JsonValue]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.get("expert").is_some() && item.get("op").is_none())
}

/// Expert name (default `unknown`) and typed steps, or a composition.
fn parse_yaml(yaml: &str) -> Result<ParsedTrace> {
    let doc: JsonValue = serde_yaml::from_str(yaml)?;
    let mut map = match doc {
        JsonValue::Object(map) => map,
        JsonValue::Array(items) if is_composed(&items) => {
            return Ok(ParsedTrace::Composed {
                expert: COMPOSED_EXPERT.to_string(),
                sub_traces: items,
            })
        }
        _ => return Err(Error::invalid_request("YAML output is not a mapping")),
    };

    let declared = map.get("expert").and_then(JsonValue::as_str).map(str::to_string);
    let items = match map.remove("trace") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items,
        Some(_) => return Err(Error::invalid_request("Trace is not a list")),
    };

    if declared.as_deref() == Some(COMPOSED_EXPERT) || is_composed(&items) {
        return Ok(ParsedTrace::Composed {
            expert: declared.unwrap_or_else(|| COMPOSED_EXPERT.to_string()),
            sub_traces: items,
        });
    }

    let steps: Vec<TraceStep> = serde_json::from_value(JsonValue::Array(items))?;
    Ok(ParsedTrace::Single {
        expert: declared.unwrap_or_else(|| UNKNOWN_EXPERT.to_string()),
        steps,
    })
}
