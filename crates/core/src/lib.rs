//! Core types, configuration, and trace execution for the virtual experts.
//!
//! This crate provides the building blocks shared by the problem generator
//! and the expert solvers: the error type, layered configuration, tracing
//! setup, the typed trace model, the trace interpreter and the solver
//! registry with its composition solver.

pub mod composition;
pub mod config;
pub mod error;
pub mod registry;
pub mod solver;
pub mod telemetry;
pub mod types;

pub use composition::{CompositionSolver, COMPOSED_EXPERT};
pub use error::{Error, Result};
pub use registry::SolverRegistry;
pub use solver::{
    answers_agree, run_trace, snap_answer, TraceSolver, TraceState, DEFAULT_TOLERANCE,
};
pub use types::*;
