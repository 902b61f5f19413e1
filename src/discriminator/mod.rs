//! Discriminators: single-collection polymorphism.
//!
//! A discriminator child schema is derived from its base by
//! composition and tied to a value stored in the base's key field.
//! Children register either on a model (root level) or on a
//! document-shaped path inside a schema (embedded level); stored
//! documents are dispatched back to the right child by the stored
//! value.

mod errors;
mod registry;

pub use errors::DiscriminatorError;
pub use registry::{DiscriminatorEntry, DiscriminatorRegistry};

pub(crate) use registry::check_registration;

use tracing::debug;

use crate::schema::{compose_for_discriminator, Schema, SchemaPath, SchemaType, TiedValue};

/// How a schema participates in a discriminator hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorMapping {
    /// Field the hierarchy stores its dispatch value in.
    pub key: String,
    /// Value this schema is tied to. `None` for roots.
    pub value: Option<TiedValue>,
    /// Roots accept registrations; children do not.
    pub is_root: bool,
}

impl DiscriminatorMapping {
    pub(crate) fn root(key: impl Into<String>) -> Self {
        DiscriminatorMapping {
            key: key.into(),
            value: None,
            is_root: true,
        }
    }

    pub(crate) fn child(key: impl Into<String>, value: TiedValue) -> Self {
        DiscriminatorMapping {
            key: key.into(),
            value: Some(value),
            is_root: false,
        }
    }
}

/// Registers a discriminator child on a document-shaped path of
/// `schema`. Used by [`Schema::discriminator_at`].
///
/// All preconditions are checked before any structure is touched;
/// a failed registration leaves the schema exactly as it was.
pub(crate) fn register_at_path(
    schema: &mut Schema,
    path: &str,
    name: &str,
    child: &Schema,
    tied: Option<TiedValue>,
) -> Result<(), DiscriminatorError> {
    let tied = tied.unwrap_or_else(|| TiedValue::String(name.to_string()));

    // Check phase: no mutation below this comment until every
    // precondition has passed.
    let merged = {
        let Some(descriptor) = schema.paths().get(path) else {
            return Err(DiscriminatorError::UnsupportedPath {
                path: path.to_string(),
                reason: "path is not declared".to_string(),
            });
        };
        let Some(base) = descriptor.ty().embedded_schema() else {
            return Err(DiscriminatorError::UnsupportedPath {
                path: path.to_string(),
                reason: format!(
                    "`{}` is not document-shaped",
                    descriptor.ty().type_name()
                ),
            });
        };
        if base.discriminator().is_some_and(|m| !m.is_root) {
            return Err(DiscriminatorError::NotRoot {
                name: name.to_string(),
            });
        }
        let key = base.discriminator_key().to_string();
        let existing = descriptor
            .discriminators()
            .into_iter()
            .flat_map(|r| r.entries().map(|e| (e.name(), e.tied())));
        check_registration(path, &key, base.options(), existing, name, &tied, child)?;

        let mut merged = compose_for_discriminator(base, child);
        merged.set_discriminator(DiscriminatorMapping::child(key, tied.clone()));
        merged
    };

    // Commit phase.
    let Some(descriptor) = schema.paths_mut().get_mut(path) else {
        return Err(DiscriminatorError::UnsupportedPath {
            path: path.to_string(),
            reason: "path is not declared".to_string(),
        });
    };
    let key = merged
        .discriminator()
        .map(|m| m.key.clone())
        .unwrap_or_default();
    if let SchemaType::Embedded(base) = descriptor.ty.innermost_mut() {
        if base.discriminator().is_none() {
            base.set_discriminator(DiscriminatorMapping::root(key.clone()));
        }
    }
    let registry = ensure_registry(descriptor, &key);
    registry.insert(DiscriminatorEntry {
        name: name.to_string(),
        tied,
        schema: std::sync::Arc::new(merged),
    });
    debug!(path, name, "registered embedded discriminator");
    Ok(())
}

fn ensure_registry<'a>(descriptor: &'a mut SchemaPath, key: &str) -> &'a mut DiscriminatorRegistry {
    descriptor
        .discriminators
        .get_or_insert_with(|| DiscriminatorRegistry::new(key))
}
