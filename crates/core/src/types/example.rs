use serde::{Deserialize, Serialize};

use super::trace::TraceStep;

// =============================================================================
// Generated Examples
// =============================================================================

/// A generated word problem with its verified solution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceExample {
    /// Expert whose solver executes the trace.
    pub expert: String,

    /// Natural-language problem text.
    pub query: String,

    /// Typed solution steps.
    pub trace: Vec<TraceStep>,

    /// Answer computed by the schema formula.
    pub answer: f64,

    /// Operation to call on the expert.
    #[serde(default = "default_operation")]
    pub expected_operation: String,

    /// Schema the example was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Generator seed, when one was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default = "default_true")]
    pub constraints_satisfied: bool,

    /// Constraints that still failed after the retry budget ran out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violated_constraints: Vec<String>,
}

fn default_operation() -> String {
    "execute_trace".to_string()
}

fn default_true() -> bool {
    true
}

impl TraceExample {
    /// Number of `compute` steps in the trace.
    pub fn depth(&self) -> usize {
        self.trace.iter().filter(|s| s.is_compute()).count()
    }
}
