//! Materialization: defaults, implicit arrays, and recursive embedded
//! dispatch.
//!
//! Materializing walks a raw value against its effective schema:
//! absent paths receive their defaults, array paths come into
//! existence as empty arrays, and every embedded document is resolved
//! to its discriminator variant before the walk descends into it.
//! Array nesting is walked dimension by dimension, so a registry on an
//! array-of-arrays path applies to the innermost documents.

use serde_json::Value;

use crate::discriminator::DiscriminatorRegistry;
use crate::schema::{Schema, SchemaType, TiedValue};

use super::access::{ensure_path_mut, value_at, value_at_mut};

/// An unrecognized discriminator value observed during a walk.
/// Hydration turns these into immediate errors; fresh construction
/// leaves them to validation, which re-derives them from the data.
#[derive(Debug, Clone)]
pub(crate) struct DispatchIssue {
    pub path: String,
    pub value: String,
    pub model: String,
}

pub(crate) fn materialize_document(
    data: &mut Value,
    schema: &Schema,
    model: &str,
    prefix: &str,
    issues: &mut Vec<DispatchIssue>,
) {
    if !data.is_object() {
        return;
    }
    for (name, descriptor) in schema.paths().iter() {
        if value_at(data, name).is_none() {
            if let Some(default) = descriptor.default() {
                if let Some(slot) = ensure_path_mut(data, name) {
                    *slot = default.produce();
                }
            } else if matches!(descriptor.ty(), SchemaType::Array(_)) {
                // Arrays exist implicitly, like defaults but universal.
                if let Some(slot) = ensure_path_mut(data, name) {
                    *slot = Value::Array(Vec::new());
                }
            }
        }
        if matches!(
            descriptor.ty(),
            SchemaType::Embedded(_) | SchemaType::Array(_)
        ) {
            if let Some(target) = value_at_mut(data, name) {
                prepare_element(
                    target,
                    descriptor.ty(),
                    descriptor.discriminators(),
                    &join_path(prefix, name),
                    model,
                    issues,
                );
            }
        }
    }
}

/// Dispatches and materializes one value of the given type. For array
/// types this walks every element; the registry rides along to the
/// innermost document level.
pub(crate) fn prepare_element(
    value: &mut Value,
    ty: &SchemaType,
    registry: Option<&DiscriminatorRegistry>,
    path: &str,
    model: &str,
    issues: &mut Vec<DispatchIssue>,
) {
    match ty {
        SchemaType::Array(element) => {
            if let Value::Array(items) = value {
                for (index, item) in items.iter_mut().enumerate() {
                    prepare_element(
                        item,
                        element,
                        registry,
                        &format!("{path}[{index}]"),
                        model,
                        issues,
                    );
                }
            }
        }
        SchemaType::Embedded(base) => {
            if !value.is_object() {
                return;
            }
            let chosen = match resolve_element_schema(value, base, registry) {
                Ok(schema) => schema,
                Err(shown) => {
                    issues.push(DispatchIssue {
                        path: path.to_string(),
                        value: shown,
                        model: model.to_string(),
                    });
                    base
                }
            };
            materialize_document(value, chosen, model, path, issues);
        }
        _ => {}
    }
}

/// Resolves the schema governing one embedded document: the variant
/// tied to its stored key value, or the base when the key is absent.
/// An unrecognized or non-scalar stored value is returned for the
/// caller to report.
pub(crate) fn resolve_element_schema<'a>(
    value: &Value,
    base: &'a Schema,
    registry: Option<&'a DiscriminatorRegistry>,
) -> Result<&'a Schema, String> {
    let Some(registry) = registry else {
        return Ok(base);
    };
    let stored = match value.get(registry.key()) {
        None | Some(Value::Null) => return Ok(base),
        Some(v) => v,
    };
    let shown = stored
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| stored.to_string());
    let Some(tied) = TiedValue::from_json(stored) else {
        return Err(shown);
    };
    match registry.match_value(&tied) {
        Some(entry) => Ok(entry.schema().as_ref()),
        None => Err(shown),
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
