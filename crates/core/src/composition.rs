//! Composed multi-expert traces.
//!
//! A composed trace is a list of sub-traces, each naming its own expert:
//!
//! ```yaml
//! - expert: percentage
//!   trace:
//!     - {op: init, var: price, value: 80}
//!     - {op: init, var: rate, value: 25}
//!     - {op: percent_off, base: price, rate: rate, var: sale}
//!     - {op: query, var: sale}
//! - expert: arithmetic
//!   trace:
//!     - {op: init, var: prev, source: prev.result}
//!     - {op: init, var: shipping, value: 5}
//!     - {op: compute, compute_op: add, args: [prev, shipping], var: total}
//!     - {op: query, var: total}
//! ```
//!
//! Sub-traces run in order. An `init` step with a `source` receives an
//! earlier sub-trace's answer: `prev.result` is the one just before,
//! `subN.result` is the N-th (zero-based). Unresolvable sources bind 0.

use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::registry::SolverRegistry;
use crate::types::{TraceResult, TraceStep, Value};

/// Expert name reported for composed results.
pub const COMPOSED_EXPERT: &str = "composed";

const UNKNOWN_EXPERT: &str = "unknown";

/// Runs composed traces against the experts of a shared registry.
pub struct CompositionSolver {
    registry: Arc<SolverRegistry>,
}

impl CompositionSolver {
    pub fn new(registry: Arc<SolverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SolverRegistry> {
        &self.registry
    }

    /// Execute sub-traces in order, piping answers forward.
    ///
    /// On failure `steps_executed` counts the sub-traces that completed.
    pub async fn execute(&self, sub_traces: &[JsonValue]) -> TraceResult {
        if sub_traces.is_empty() {
            return TraceResult::failed(COMPOSED_EXPERT, "Empty composition (no sub-traces)");
        }

        let mut answers: Vec<Option<f64>> = Vec::with_capacity(sub_traces.len());

        for (i, sub) in sub_traces.iter().enumerate() {
            let expert_name = sub
                .get("expert")
                .and_then(JsonValue::as_str)
                .unwrap_or(UNKNOWN_EXPERT);

            let raw = match sub.get("trace") {
                None | Some(JsonValue::Null) => JsonValue::Array(Vec::new()),
                Some(list @ JsonValue::Array(_)) => list.clone(),
                Some(_) => {
                    return failed_at(i, format!("Sub-trace {} ({}): trace is not a list", i, expert_name))
                }
            };

            let steps: Vec<TraceStep> = match serde_json::from_value(raw) {
                Ok(steps) => steps,
                Err(e) => {
                    return failed_at(
                        i,
                        format!("Sub-trace {} ({}): step parse error: {}", i, expert_name, e),
                    )
                }
            };
            let steps = resolve_sources(steps, &answers);

            let Some(solver) = self.registry.get(expert_name) else {
                return failed_at(i, format!("Sub-trace {}: expert '{}' not found", i, expert_name));
            };

            let params = match serde_json::to_value(&steps) {
                Ok(trace) => serde_json::json!({ "trace": trace }),
                Err(e) => return failed_at(i, format!("Sub-trace {} ({}): {}", i, expert_name, e)),
            };
            let result = match solver.execute_operation("execute_trace", params).await {
                Ok(result) => result,
                Err(e) => TraceResult::failed(expert_name, e.to_string()),
            };
            if !result.success {
                let error = result.error.unwrap_or_default();
                tracing::debug!(sub_trace = i, expert = %expert_name, error = %error, "Sub-trace failed");
                return failed_at(i, format!("Sub-trace {} ({}): {}", i, expert_name, error));
            }

            answers.push(result.answer);
        }

        TraceResult {
            success: true,
            answer: answers.last().copied().flatten(),
            state: Default::default(),
            error: None,
            expert: COMPOSED_EXPERT.to_string(),
            steps_executed: sub_traces.len(),
        }
    }
}

fn failed_at(index: usize, error: String) -> TraceResult {
    TraceResult {
        steps_executed: index,
        ..TraceResult::failed(COMPOSED_EXPERT, error)
    }
}

/// Replace sourced `init` steps with the referenced answers.
fn resolve_sources(steps: Vec<TraceStep>, answers: &[Option<f64>]) -> Vec<TraceStep> {
    steps
        .into_iter()
        .map(|step| match step {
            TraceStep::Init {
                var,
                source: Some(source),
                ..
            } => {
                let answer = if source == "prev.result" {
                    answers.last().copied().flatten()
                } else {
                    source_index(&source)
                        .and_then(|idx| answers.get(idx))
                        .copied()
                        .flatten()
                };
                TraceStep::Init {
                    var,
                    value: Value::Float(answer.unwrap_or(0.0)),
                    source: None,
                }
            }
            other => other,
        })
        .collect()
}

/// Index in `subN.result`.
fn source_index(source: &str) -> Option<usize> {
    let rest = source.strip_prefix("sub")?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || !rest[digits..].starts_with(".result") {
        return None;
    }
    rest[..digits].parse().ok()
}
