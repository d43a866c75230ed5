use crate::path::Path;
use thiserror::Error;

/// Errors that can occur while parsing the declarative schema configuration.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("Failed to parse schema JSON: {0}")]
    JsonParse(String),

    #[error(
        "Field '{path}' must be exactly one of a leaf (type), an object (properties), a list (item) or an anonymous object, but declares: {found}"
    )]
    AmbiguousShape { path: Path, found: String },

    #[error("Field '{path}' has an invalid value pattern '{pattern}': {message}")]
    InvalidValuePattern {
        path: Path,
        pattern: String,
        message: String,
    },

    #[error("Field '{path}' has an invalid 'when' expression: {message}")]
    InvalidExpression { path: Path, message: String },
}

/// Fatal configuration errors surfaced while applying visibility transitions.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error(
        "Field '{path}' declares a value pattern but has no default value, and the model holds no value to extract from"
    )]
    MissingDefault { path: Path },
}

/// Errors reported by dynamic option source resolution. These are logged and
/// swallowed by the engine; the previously applied option list is retained.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Source for '{path}' failed to resolve: {message}")]
    ResolutionFailed { path: Path, message: String },
}
