//! Schema-driven arithmetic word-problem generation.
//!
//! Schemas (JSON) declare variables, constraints, a solution trace and an
//! answer formula. [`SchemaGenerator`] samples them into natural-language
//! problems whose traces are replayed by the arithmetic experts and
//! cross-checked against the formula. [`TemplateAnalyzer`] measures how
//! templated a generated batch reads.

pub mod analyzer;
pub mod constraints;
pub mod contracts;
pub mod domains;
pub mod experts;
pub mod expression;
pub mod generator;
pub mod loader;
pub mod perturbation;
pub mod resolver;
pub mod sampler;
pub mod schema;
pub mod template;
pub mod transforms;
pub mod variables;
pub mod verifier;
pub mod vocab;

pub use analyzer::{QueryAnalysis, TargetComparison, TargetProfile, TemplateAnalyzer};
pub use constraints::{ConstraintOutcome, ConstraintValidator};
pub use contracts::ContractValidator;
pub use domains::{DomainContext, DomainSampler};
pub use experts::{
    default_solvers, ArithmeticSolver, ComparisonSolver, EntityTrackSolver, PercentageSolver,
    RateEquationSolver,
};
pub use expression::Expression;
pub use generator::SchemaGenerator;
pub use loader::{SchemaComposer, SchemaLoader};
pub use perturbation::{NumericDiversifier, TemplatePerturbator};
pub use resolver::{TemplateResolver, TemplateVars};
pub use sampler::{VocabItems, VocabSampler};
pub use schema::{OrderedMap, SchemaSpec};
pub use transforms::TransformRegistry;
pub use variables::{VariableGenerator, VariableMap};
pub use verifier::TraceVerifier;
pub use vocab::{Person, Vocab};

/// Bundled schemas and vocabulary shipped with this crate.
pub mod data {
    use std::path::PathBuf;

    pub fn schema_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join("schemas")
    }

    pub fn vocab_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join("vocab")
    }
}
