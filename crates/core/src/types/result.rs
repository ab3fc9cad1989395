use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Execution Results
// =============================================================================

/// Outcome of replaying a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub success: bool,

    /// Value of the queried variable, if the trace queried one.
    pub answer: Option<f64>,

    /// Final variable state.
    pub state: BTreeMap<String, f64>,

    pub error: Option<String>,

    /// Solver that executed the trace.
    pub expert: String,

    pub steps_executed: usize,
}

impl TraceResult {
    pub fn failed(expert: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: None,
            state: BTreeMap::new(),
            error: Some(error.into()),
            expert: expert.into(),
            steps_executed: 0,
        }
    }
}

/// Graduated reward for a model-produced trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// The trace parsed as YAML.
    pub parsed: bool,

    /// The declared expert matches the expected one.
    pub expert_correct: bool,

    /// The trace executed without errors.
    pub trace_valid: bool,

    /// The computed answer matches the expected one.
    pub answer_correct: bool,

    /// 0.0 unparsable, 0.3 wrong expert, 0.5 failed trace, 0.7 executed
    /// with a wrong or unchecked answer, 1.0 correct.
    pub reward: f64,

    pub computed_answer: Option<f64>,

    pub expected_answer: Option<f64>,

    pub expert: Option<String>,

    pub error: Option<String>,
}

impl VerificationResult {
    pub const REWARD_UNPARSABLE: f64 = 0.0;
    pub const REWARD_WRONG_EXPERT: f64 = 0.3;
    pub const REWARD_TRACE_FAILED: f64 = 0.5;
    pub const REWARD_EXECUTED: f64 = 0.7;
    pub const REWARD_CORRECT: f64 = 1.0;

    pub fn unparsable(error: impl Into<String>) -> Self {
        Self {
            parsed: false,
            expert_correct: false,
            trace_valid: false,
            answer_correct: false,
            reward: Self::REWARD_UNPARSABLE,
            computed_answer: None,
            expected_answer: None,
            expert: None,
            error: Some(error.into()),
        }
    }
}
