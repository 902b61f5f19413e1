//! Validation: a full walk of a document against its effective
//! schema, collecting every problem instead of stopping at the first.

use std::fmt;

use serde_json::Value;

use crate::discriminator::DiscriminatorRegistry;
use crate::schema::{json_type_name, Schema, SchemaType};

use super::access::value_at;
use super::dispatch::{join_path, resolve_element_schema};

/// Category of one validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    /// A required path is absent or null.
    Required,
    /// A stored value does not conform to the declared type.
    TypeMismatch,
    /// A custom validator rejected the value.
    Custom,
    /// An undeclared field in a strict schema.
    StrictMode,
    /// A stored discriminator value no child is tied to.
    DiscriminatorNotFound,
    /// The discriminator key was changed after dispatch.
    DiscriminatorKeyProtected,
    /// The document (or an embedded document) is not an object.
    MalformedDocument,
}

/// One validation failure with its location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationEntry {
    pub path: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationEntry {
    pub(crate) fn required(path: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::Required,
            message: format!("path `{path}` is required"),
        }
    }

    pub(crate) fn type_mismatch(path: &str, expected: &str, actual: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::TypeMismatch,
            message: format!("expected {expected}, got {actual}"),
        }
    }

    pub(crate) fn custom(path: &str, message: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::Custom,
            message: message.to_string(),
        }
    }

    pub(crate) fn strict(path: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::StrictMode,
            message: format!("field `{path}` is not declared in the schema"),
        }
    }

    pub(crate) fn discriminator_not_found(path: &str, value: &str, model: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::DiscriminatorNotFound,
            message: format!("Discriminator \"{value}\" not found for model \"{model}\""),
        }
    }

    pub(crate) fn key_protected(path: &str, key: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::DiscriminatorKeyProtected,
            message: format!("Can't set discriminator key \"{key}\""),
        }
    }

    pub(crate) fn malformed(path: &str, actual: &str) -> Self {
        ValidationEntry {
            path: path.to_string(),
            kind: ValidationKind::MalformedDocument,
            message: format!("expected document, got {actual}"),
        }
    }
}

/// Aggregate of every failure found in one validation pass.
#[derive(Debug, Clone)]
pub struct ValidationError {
    model: String,
    entries: Vec<ValidationEntry>,
}

impl ValidationError {
    pub(crate) fn new(model: impl Into<String>, entries: Vec<ValidationEntry>) -> Self {
        ValidationError {
            model: model.into(),
            entries,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn has(&self, kind: ValidationKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    /// First entry at the given path, if any.
    pub fn at(&self, path: &str) -> Option<&ValidationEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation of `{}` failed", self.model)?;
        for entry in &self.entries {
            if entry.path.is_empty() {
                write!(f, "; {}", entry.message)?;
            } else {
                write!(f, "; {}: {}", entry.path, entry.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Walks `data` against `schema`, pushing every failure into
/// `entries`. Embedded documents are dispatched to their variant
/// before descending; a mixed path is never descended into.
pub(crate) fn validate_document(
    data: &Value,
    schema: &Schema,
    model: &str,
    prefix: &str,
    entries: &mut Vec<ValidationEntry>,
) {
    let Some(map) = data.as_object() else {
        entries.push(ValidationEntry::malformed(prefix, json_type_name(data)));
        return;
    };

    if schema.options().strict() {
        let key = schema.discriminator_key();
        let id = schema.id_field();
        for field in map.keys() {
            if field == key || field == id || schema.paths().covers_segment(field) {
                continue;
            }
            entries.push(ValidationEntry::strict(&join_path(prefix, field)));
        }
    }

    for (name, descriptor) in schema.paths().iter() {
        let qualified = join_path(prefix, name);
        let Some(value) = value_at(data, name).filter(|v| !v.is_null()) else {
            if descriptor.is_required() {
                entries.push(ValidationEntry::required(&qualified));
            }
            continue;
        };
        check_value(
            value,
            descriptor.ty(),
            descriptor.discriminators(),
            model,
            &qualified,
            entries,
        );
        for validator in descriptor.validators() {
            if !validator.check(value) {
                entries.push(ValidationEntry::custom(&qualified, validator.message()));
            }
        }
    }
}

fn check_value(
    value: &Value,
    ty: &SchemaType,
    registry: Option<&DiscriminatorRegistry>,
    model: &str,
    path: &str,
    entries: &mut Vec<ValidationEntry>,
) {
    match ty {
        SchemaType::Mixed => {}
        SchemaType::Array(element) => {
            let Some(items) = value.as_array() else {
                entries.push(ValidationEntry::type_mismatch(
                    path,
                    "array",
                    json_type_name(value),
                ));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                check_value(
                    item,
                    element,
                    registry,
                    model,
                    &format!("{path}[{index}]"),
                    entries,
                );
            }
        }
        SchemaType::Embedded(base) => {
            if !value.is_object() {
                entries.push(ValidationEntry::type_mismatch(
                    path,
                    "document",
                    json_type_name(value),
                ));
                return;
            }
            let chosen = match resolve_element_schema(value, base, registry) {
                Ok(schema) => schema,
                Err(shown) => {
                    entries.push(ValidationEntry::discriminator_not_found(
                        path, &shown, model,
                    ));
                    base
                }
            };
            validate_document(value, chosen, model, path, entries);
        }
        scalar => {
            if !scalar.accepts(value) {
                entries.push(ValidationEntry::type_mismatch(
                    path,
                    scalar.type_name(),
                    json_type_name(value),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaOptions, SchemaPath, Validator};
    use serde_json::json;

    fn element_schema() -> Schema {
        Schema::with_options(SchemaOptions {
            discriminator_key: Some("kind".to_string()),
            ..Default::default()
        })
        .path("message", SchemaPath::required(SchemaType::String))
    }

    fn owner() -> Schema {
        let mut schema = Schema::new().path(
            "events",
            SchemaPath::new(SchemaType::array_of(SchemaType::document(element_schema()))),
        );
        let purchased =
            Schema::new().path("product", SchemaPath::required(SchemaType::String));
        schema
            .discriminator_at("events", "Purchased", &purchased)
            .unwrap();
        schema
    }

    fn run(data: &Value, schema: &Schema) -> Vec<ValidationEntry> {
        let mut entries = Vec::new();
        validate_document(data, schema, "Log", "", &mut entries);
        entries
    }

    #[test]
    fn variant_required_paths_apply_per_element() {
        let schema = owner();
        let entries = run(
            &json!({"events": [
                {"kind": "Purchased", "message": "m"},
                {"message": "base is fine"}
            ]}),
            &schema,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "events[0].product");
        assert_eq!(entries[0].kind, ValidationKind::Required);
    }

    #[test]
    fn unknown_element_kind_is_reported_in_place() {
        let schema = owner();
        let entries = run(
            &json!({"events": [{"kind": "Refunded", "message": "m"}]}),
            &schema,
        );
        assert_eq!(entries[0].kind, ValidationKind::DiscriminatorNotFound);
        assert_eq!(entries[0].path, "events[0]");
        assert_eq!(
            entries[0].message,
            "Discriminator \"Refunded\" not found for model \"Log\""
        );
    }

    #[test]
    fn strict_mode_flags_undeclared_fields_but_not_the_key() {
        let schema = owner();
        let entries = run(
            &json!({"events": [{"kind": "Purchased", "message": "m", "product": "p", "stray": 1}]}),
            &schema,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ValidationKind::StrictMode);
        assert_eq!(entries[0].path, "events[0].stray");
    }

    #[test]
    fn mixed_paths_are_opaque() {
        let schema = Schema::new().path("run", SchemaPath::new(SchemaType::Mixed));
        let entries = run(&json!({"run": {"tab": {"id": 42}}}), &schema);
        assert!(entries.is_empty());
    }

    #[test]
    fn scalar_mismatches_name_both_types() {
        let schema = Schema::new().path("count", SchemaPath::new(SchemaType::Int));
        let entries = run(&json!({"count": "three"}), &schema);
        assert_eq!(entries[0].message, "expected int, got string");
    }

    #[test]
    fn custom_validators_run_on_present_values_only() {
        let schema = Schema::new().path(
            "name",
            SchemaPath::new(SchemaType::String).with_validator(Validator::new(
                "name must not be empty",
                |v| v.as_str().map(|s| !s.is_empty()).unwrap_or(false),
            )),
        );
        assert!(run(&json!({}), &schema).is_empty());
        let entries = run(&json!({"name": ""}), &schema);
        assert_eq!(entries[0].kind, ValidationKind::Custom);
        assert_eq!(entries[0].message, "name must not be empty");
    }

    #[test]
    fn null_counts_as_absent_for_required() {
        let schema = Schema::new().path("message", SchemaPath::required(SchemaType::String));
        let entries = run(&json!({"message": null}), &schema);
        assert_eq!(entries[0].kind, ValidationKind::Required);
    }
}
