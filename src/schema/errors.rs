//! Error types for schema construction and definition parsing.

use thiserror::Error;

/// Errors raised while building a schema or parsing a schema definition.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// The value handed to the definition parser was not a usable
    /// schema description.
    #[error("invalid schema definition: {0}")]
    Configuration(String),
}

impl SchemaError {
    /// Convenience constructor for definition-shape problems.
    pub fn configuration(message: impl Into<String>) -> Self {
        SchemaError::Configuration(message.into())
    }
}

/// Error returned by instance methods and statics installed on a schema.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MethodError(String);

impl MethodError {
    pub fn new(message: impl Into<String>) -> Self {
        MethodError(message.into())
    }
}
