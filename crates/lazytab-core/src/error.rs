use std::fmt::Display;

use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque error produced by an execution backend or dataset provider.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot infer type of literal: {0}")]
    TypeInference(String),

    #[error("type error in {context}: expected {expected}, found {actual}")]
    Type {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("incompatible scopes: {0}")]
    IncompatibleScope(String),

    #[error("cannot realize expression: {0}")]
    UnrealizableExpression(String),

    // Passed through untouched; the core never retries or reinterprets it.
    #[error("backend execution failed: {0}")]
    Backend(#[source] BoxError),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("hashing error: {0}")]
    Hash(String),
}

impl Error {
    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl Display,
        actual: impl Display,
    ) -> Self {
        Error::Type {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// True for errors raised while building a graph (as opposed to executing one).
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::TypeInference(_)
                | Error::Type { .. }
                | Error::IncompatibleScope(_)
                | Error::Schema(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
