use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::Value;
use crate::error::{Error, Result};

// =============================================================================
// Trace Types
// =============================================================================

/// Arithmetic operation applied by a `compute` or `compare` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Sqrt,
    Abs,
    Min,
    Max,
}

impl ComputeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeOp::Add => "add",
            ComputeOp::Sub => "sub",
            ComputeOp::Mul => "mul",
            ComputeOp::Div => "div",
            ComputeOp::Mod => "mod",
            ComputeOp::Pow => "pow",
            ComputeOp::Sqrt => "sqrt",
            ComputeOp::Abs => "abs",
            ComputeOp::Min => "min",
            ComputeOp::Max => "max",
        }
    }

    /// Apply the operation to already-resolved arguments.
    ///
    /// `add`/`mul`/`min`/`max` are variadic, `sub` subtracts every later
    /// argument from the first, `mod` floors like the formula evaluator.
    pub fn apply(&self, args: &[f64]) -> Result<f64> {
        let arity = |min: usize, max: Option<usize>| -> Result<()> {
            let ok = args.len() >= min && max.map_or(true, |m| args.len() <= m);
            if ok {
                Ok(())
            } else {
                Err(Error::trace(format!(
                    "{} expects {} argument(s), got {}",
                    self,
                    match max {
                        Some(m) if m == min => format!("{}", m),
                        Some(m) => format!("{}..={}", min, m),
                        None => format!("at least {}", min),
                    },
                    args.len()
                )))
            }
        };

        match self {
            ComputeOp::Add => {
                arity(1, None)?;
                Ok(args.iter().sum())
            }
            ComputeOp::Sub => {
                arity(1, None)?;
                Ok(args[0] - args[1..].iter().sum::<f64>())
            }
            ComputeOp::Mul => {
                arity(1, None)?;
                Ok(args.iter().product())
            }
            ComputeOp::Div => {
                arity(2, Some(2))?;
                if args[1] == 0.0 {
                    return Err(Error::trace("division by zero"));
                }
                Ok(args[0] / args[1])
            }
            ComputeOp::Mod => {
                arity(2, Some(2))?;
                if args[1] == 0.0 {
                    return Err(Error::trace("modulo by zero"));
                }
                Ok(args[0] - args[1] * (args[0] / args[1]).floor())
            }
            ComputeOp::Pow => {
                arity(2, Some(2))?;
                Ok(args[0].powf(args[1]))
            }
            ComputeOp::Sqrt => {
                arity(1, Some(1))?;
                if args[0] < 0.0 {
                    return Err(Error::trace("square root of a negative number"));
                }
                Ok(args[0].sqrt())
            }
            ComputeOp::Abs => {
                arity(1, Some(1))?;
                Ok(args[0].abs())
            }
            ComputeOp::Min => {
                arity(1, None)?;
                Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
            }
            ComputeOp::Max => {
                arity(1, None)?;
                Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            }
        }
    }
}

impl fmt::Display for ComputeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trace argument: a numeric literal or the name of a state variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Name(String),
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Number(v)
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Name(v.to_string())
    }
}

fn zero() -> Value {
    Value::Int(0)
}

/// One typed step of a solution trace, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceStep {
    /// Bind a variable to a given value.
    Init {
        var: String,
        #[serde(default = "zero")]
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Bind several variables at once.
    Given { values: BTreeMap<String, f64> },
    Compute {
        compute_op: ComputeOp,
        args: Vec<Operand>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        var: Option<String>,
    },
    /// Informational annotation, never executed.
    Formula { expression: String },
    /// Selects the variable whose value is the answer.
    Query { var: String },
    /// Assert expected values mid-trace.
    State { assertions: BTreeMap<String, f64> },

    // Entity tracking
    Transfer {
        from_entity: String,
        to_entity: String,
        amount: Operand,
    },
    Consume { entity: String, amount: Operand },
    AddEntity { entity: String, amount: Operand },

    // Percentages
    PercentOff {
        base: Operand,
        rate: Operand,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        var: Option<String>,
    },
    PercentIncrease {
        base: Operand,
        rate: Operand,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        var: Option<String>,
    },
    PercentOf {
        base: Operand,
        rate: Operand,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        var: Option<String>,
    },

    // Comparison
    Compare {
        compute_op: ComputeOp,
        args: Vec<Operand>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        var: Option<String>,
    },
}

impl TraceStep {
    /// The `op` tag of this step.
    pub fn op_name(&self) -> &'static str {
        match self {
            TraceStep::Init { .. } => "init",
            TraceStep::Given { .. } => "given",
            TraceStep::Compute { .. } => "compute",
            TraceStep::Formula { .. } => "formula",
            TraceStep::Query { .. } => "query",
            TraceStep::State { .. } => "state",
            TraceStep::Transfer { .. } => "transfer",
            TraceStep::Consume { .. } => "consume",
            TraceStep::AddEntity { .. } => "add_entity",
            TraceStep::PercentOff { .. } => "percent_off",
            TraceStep::PercentIncrease { .. } => "percent_increase",
            TraceStep::PercentOf { .. } => "percent_of",
            TraceStep::Compare { .. } => "compare",
        }
    }

    pub fn is_compute(&self) -> bool {
        matches!(self, TraceStep::Compute { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_tagging() {
        let step: TraceStep = serde_json::from_str(
            r#"{"op": "compute", "compute_op": "mul", "args": ["price", 3], "var": "total"}"#,
        )
        .unwrap();

        assert_eq!(
            step,
            TraceStep::Compute {
                compute_op: ComputeOp::Mul,
                args: vec![Operand::Name("price".into()), Operand::Number(3.0)],
                var: Some("total".into()),
            }
        );
        assert_eq!(step.op_name(), "compute");
    }

    #[test]
    fn test_init_value_defaults_to_zero() {
        let step: TraceStep = serde_json::from_str(r#"{"op": "init", "var": "x"}"#).unwrap();
        match step {
            TraceStep::Init { value, .. } => assert_eq!(value, Value::Int(0)),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_compute_op_semantics() {
        assert_eq!(ComputeOp::Sub.apply(&[20.0, 3.0, 4.0]).unwrap(), 13.0);
        assert_eq!(ComputeOp::Mod.apply(&[-7.0, 3.0]).unwrap(), 2.0);
        assert_eq!(ComputeOp::Max.apply(&[2.0, 9.0, 4.0]).unwrap(), 9.0);
        assert!(ComputeOp::Div.apply(&[1.0, 0.0]).is_err());
        assert!(ComputeOp::Sqrt.apply(&[4.0, 9.0]).is_err());
    }
}
