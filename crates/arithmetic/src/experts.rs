//! Arithmetic virtual experts.
//!
//! Every expert shares the core trace interpreter; the ones below add the
//! domain steps their schemas use.

use async_trait::async_trait;
use std::sync::Arc;

use virtual_expert_core::{Error, Result, TraceSolver, TraceState, TraceStep};

// =============================================================================
// Arithmetic
// =============================================================================

/// Pure arithmetic chains: init, compute, query.
pub struct ArithmeticSolver;

#[async_trait]
impl TraceSolver for ArithmeticSolver {
    fn name(&self) -> &str {
        "arithmetic"
    }

    fn description(&self) -> &str {
        "Pure arithmetic chains: price totals, unit conversions, multi-step calculations"
    }
}

// =============================================================================
// Rate Equation
// =============================================================================

/// Rate, time, and work problems.
pub struct RateEquationSolver;

#[async_trait]
impl TraceSolver for RateEquationSolver {
    fn name(&self) -> &str {
        "rate_equation"
    }

    fn description(&self) -> &str {
        "Rate, distance, time and work-rate problems"
    }
}

// =============================================================================
// Entity Tracking
// =============================================================================

/// Quantities moving between entities.
pub struct EntityTrackSolver;

#[async_trait]
impl TraceSolver for EntityTrackSolver {
    fn name(&self) -> &str {
        "entity_track"
    }

    fn description(&self) -> &str {
        "Tracks entity quantities through transfers, consumption and additions"
    }

    fn execute_step(&self, step: &TraceStep, state: &mut TraceState) -> Result<()> {
        let tolerance = self.tolerance();
        match step {
            TraceStep::Transfer {
                from_entity,
                to_entity,
                amount,
            } => {
                let amount = state.resolve(amount)?;
                let available = state.get(from_entity).unwrap_or(0.0);
                if available < amount - tolerance {
                    return Err(Error::trace(format!(
                        "Insufficient {} for transfer ({} < {})",
                        from_entity, available, amount
                    )));
                }
                let received = state.get(to_entity).unwrap_or(0.0);
                state.set(from_entity.clone(), available - amount);
                state.set(to_entity.clone(), received + amount);
                Ok(())
            }
            TraceStep::Consume { entity, amount } => {
                let amount = state.resolve(amount)?;
                let available = state
                    .get(entity)
                    .ok_or_else(|| Error::trace(format!("Entity {} not initialized", entity)))?;
                if available < amount - tolerance {
                    return Err(Error::trace(format!(
                        "Insufficient {} for consume ({} < {})",
                        entity, available, amount
                    )));
                }
                state.set(entity.clone(), available - amount);
                Ok(())
            }
            TraceStep::AddEntity { entity, amount } => {
                let amount = state.resolve(amount)?;
                let current = state.get(entity).unwrap_or(0.0);
                state.set(entity.clone(), current + amount);
                Ok(())
            }
            other => Err(Error::trace(format!(
                "Unknown entity_track operation: {}",
                other.op_name()
            ))),
        }
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// Discounts, markups and "r% of b".
pub struct PercentageSolver;

#[async_trait]
impl TraceSolver for PercentageSolver {
    fn name(&self) -> &str {
        "percentage"
    }

    fn description(&self) -> &str {
        "Percentage problems: discounts, increases and parts of a whole"
    }

    fn execute_step(&self, step: &TraceStep, state: &mut TraceState) -> Result<()> {
        let (base, rate, var) = match step {
            TraceStep::PercentOff { base, rate, var }
            | TraceStep::PercentIncrease { base, rate, var }
            | TraceStep::PercentOf { base, rate, var } => (base, rate, var),
            other => {
                return Err(Error::trace(format!(
                    "Unknown percentage operation: {}",
                    other.op_name()
                )))
            }
        };

        let (b, r) = (state.resolve(base)?, state.resolve(rate)?);
        let result = match step {
            TraceStep::PercentOff { .. } => b * (1.0 - r / 100.0),
            TraceStep::PercentIncrease { .. } => b * (1.0 + r / 100.0),
            _ => b * r / 100.0,
        };
        if let Some(var) = var {
            state.set(var.clone(), result);
        }
        Ok(())
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Differences and ratios between quantities.
pub struct ComparisonSolver;

#[async_trait]
impl TraceSolver for ComparisonSolver {
    fn name(&self) -> &str {
        "comparison"
    }

    fn description(&self) -> &str {
        "Compares quantities: differences, ratios, how many more or fewer"
    }

    fn execute_step(&self, step: &TraceStep, state: &mut TraceState) -> Result<()> {
        match step {
            TraceStep::Compare {
                compute_op,
                args,
                var,
            } => {
                let values = args
                    .iter()
                    .map(|a| state.resolve(a))
                    .collect::<Result<Vec<_>>>()?;
                let result = compute_op.apply(&values)?;
                if let Some(var) = var {
                    state.set(var.clone(), result);
                }
                Ok(())
            }
            other => Err(Error::trace(format!(
                "Unknown comparison operation: {}",
                other.op_name()
            ))),
        }
    }
}

/// One instance of every arithmetic expert.
pub fn default_solvers() -> Vec<Arc<dyn TraceSolver>> {
    vec![
        Arc::new(ArithmeticSolver),
        Arc::new(RateEquationSolver),
        Arc::new(EntityTrackSolver),
        Arc::new(PercentageSolver),
        Arc::new(ComparisonSolver),
    ]
}
