//! Error types for the virtual expert workspace.

use thiserror::Error;

/// Result type alias using the workspace Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Schema Errors
    // =========================================================================
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Schema composition error: {0}")]
    Composition(String),

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    // =========================================================================
    // Generation Errors
    // =========================================================================
    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Vocabulary error: {0}")]
    Vocab(String),

    // =========================================================================
    // Trace Errors
    // =========================================================================
    #[error("Trace execution failed: {0}")]
    Trace(String),

    #[error("Trace answer {trace} does not match formula answer {formula}")]
    AnswerMismatch { formula: f64, trace: f64 },

    #[error("Solver not found: {0}")]
    SolverNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a schema load error.
    pub fn schema_load(msg: impl Into<String>) -> Self {
        Self::SchemaLoad(msg.into())
    }

    /// Create a schema validation error.
    pub fn schema_validation(msg: impl Into<String>) -> Self {
        Self::SchemaValidation(msg.into())
    }

    /// Create a composition error.
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Create an expression error.
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Create a transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a template error.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create a vocabulary error.
    pub fn vocab(msg: impl Into<String>) -> Self {
        Self::Vocab(msg.into())
    }

    /// Create a trace error.
    pub fn trace(msg: impl Into<String>) -> Self {
        Self::Trace(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
