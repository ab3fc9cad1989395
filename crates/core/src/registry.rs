//! Named solver registry shared by the verifier and the composition solver.

use dashmap::DashMap;
use std::sync::Arc;

use crate::solver::TraceSolver;

/// Solvers by name.
#[derive(Default)]
pub struct SolverRegistry {
    solvers: DashMap<String, Arc<dyn TraceSolver>>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a solver under its own name, replacing any previous one.
    pub fn register(&self, solver: Arc<dyn TraceSolver>) {
        let name = solver.name().to_string();
        tracing::debug!(expert = %name, "Registered trace solver");
        self.solvers.insert(name, solver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TraceSolver>> {
        self.solvers.get(name).map(|entry| entry.value().clone())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.solvers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }
}
