//! Schema subsystem.
//!
//! A [`Schema`] declares typed paths, lifecycle hooks, instance
//! methods, statics, virtual paths, index specs, and options.
//! Composition ([`compose`]) merges two schemas with addition-wins
//! semantics; discriminator derivation builds on it.

mod compose;
mod definition;
mod errors;
mod options;
mod path;
mod schema;
mod types;

pub use compose::compose;
pub(crate) use compose::compose_for_discriminator;
pub use errors::{MethodError, SchemaError};
pub use options::{SchemaOptions, SerializeView, DEFAULT_DISCRIMINATOR_KEY, DEFAULT_ID_FIELD};
pub use path::{PathMap, SchemaPath};
pub use schema::{IndexOrder, IndexSpec, MethodFn, Schema, StaticFn, Virtual};
pub use types::{json_type_name, DefaultValue, SchemaType, TiedValue, Validator};

pub(crate) use path::is_index_segment;
