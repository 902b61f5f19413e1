//! Model subsystem.
//!
//! Compiling a schema under a name produces a [`CompiledModel`];
//! the process-scoped [`ModelRegistry`] tracks compiled models and
//! hands them back by name.

mod compiled;
mod errors;
mod registry;

pub use compiled::CompiledModel;
pub use errors::{ModelError, ModelResult};
pub use registry::ModelRegistry;
