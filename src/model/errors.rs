//! Error types for model compilation, lookup, and collection
//! operations.

use thiserror::Error;

use crate::discriminator::DiscriminatorError;
use crate::document::ValidationError;
use crate::hooks::HookError;
use crate::schema::{MethodError, SchemaError};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    // ============================================================
    // Registry errors
    // ============================================================
    /// A model with this name is already compiled and registered.
    #[error("model `{0}` is already registered; unregister it before compiling again")]
    NameTaken(String),

    /// Lookup for a name nothing was registered under.
    #[error("model `{0}` is not registered")]
    NotFound(String),

    // ============================================================
    // Collection errors
    // ============================================================
    /// Read, update, or delete against an id with no stored document.
    #[error("document `{id}` not found in collection `{collection}`")]
    DocumentNotFound { collection: String, id: String },

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Storage(String),

    /// The update payload was not an object of dotted paths.
    #[error("invalid update payload: {0}")]
    InvalidUpdate(String),

    /// A lifecycle hook aborted the operation.
    #[error("{phase}-{operation} hook failed: {source}")]
    Hook {
        phase: &'static str,
        operation: String,
        #[source]
        source: HookError,
    },

    // ============================================================
    // Document errors
    // ============================================================
    /// A data path could not be written, e.g. an out-of-range array
    /// index or a scalar in the middle of the path.
    #[error("cannot set path `{0}`")]
    InvalidPath(String),

    /// Instance method lookup failed.
    #[error("method `{0}` is not defined")]
    UnknownMethod(String),

    /// Static lookup failed.
    #[error("static `{0}` is not defined")]
    UnknownStatic(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Discriminator(#[from] DiscriminatorError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Method(#[from] MethodError),
}
