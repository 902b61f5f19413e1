//! Schema definitions as data.
//!
//! A schema can be described as a JSON value and parsed into a
//! [`Schema`]. Two shapes are accepted: the full form with `fields`
//! and optional `options` keys, and a bare map of field definitions.
//!
//! ```json
//! {
//!   "fields": {
//!     "message": { "type": "string", "required": true },
//!     "tags":    { "type": "array", "of": { "type": "string" } },
//!     "meta":    { "type": "mixed" }
//!   },
//!   "options": { "discriminator_key": "kind" }
//! }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};

use super::errors::SchemaError;
use super::options::SchemaOptions;
use super::path::SchemaPath;
use super::schema::Schema;
use super::types::SchemaType;

#[derive(Debug, Clone, Deserialize)]
struct SchemaDefinition {
    #[serde(default)]
    fields: IndexMap<String, FieldDefinition>,
    #[serde(default)]
    options: SchemaOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldDefinition {
    #[serde(flatten)]
    ty: TypeDefinition,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TypeDefinition {
    String,
    Int,
    Float,
    Bool,
    Date,
    Mixed,
    Array {
        of: Box<TypeDefinition>,
    },
    Document {
        #[serde(default)]
        fields: IndexMap<String, FieldDefinition>,
    },
}

impl TypeDefinition {
    fn lower(self) -> SchemaType {
        match self {
            TypeDefinition::String => SchemaType::String,
            TypeDefinition::Int => SchemaType::Int,
            TypeDefinition::Float => SchemaType::Float,
            TypeDefinition::Bool => SchemaType::Bool,
            TypeDefinition::Date => SchemaType::Date,
            TypeDefinition::Mixed => SchemaType::Mixed,
            TypeDefinition::Array { of } => SchemaType::array_of(of.lower()),
            TypeDefinition::Document { fields } => {
                SchemaType::document(build(fields, SchemaOptions::default()))
            }
        }
    }
}

fn build(fields: IndexMap<String, FieldDefinition>, options: SchemaOptions) -> Schema {
    let mut schema = Schema::with_options(options);
    for (name, def) in fields {
        let mut path = if def.required {
            SchemaPath::required(def.ty.lower())
        } else {
            SchemaPath::new(def.ty.lower())
        };
        if let Some(value) = def.default {
            path = path.with_default(value);
        }
        schema.add_path(name, path);
    }
    schema
}

impl Schema {
    /// Parses a definition value into a schema.
    pub fn from_value(value: &Value) -> Result<Schema, SchemaError> {
        let Some(map) = value.as_object() else {
            return Err(SchemaError::configuration(
                "schema definition must be an object",
            ));
        };
        let normalized = if map.contains_key("fields") || map.contains_key("options") {
            value.clone()
        } else {
            json!({ "fields": value })
        };
        let definition: SchemaDefinition = serde_json::from_value(normalized)
            .map_err(|err| SchemaError::configuration(err.to_string()))?;
        Ok(build(definition.fields, definition.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_form_parses_fields_and_options() {
        let schema = Schema::from_value(&json!({
            "fields": {
                "message": { "type": "string", "required": true },
                "events": {
                    "type": "array",
                    "of": { "type": "document", "fields": {
                        "at": { "type": "date" }
                    }}
                }
            },
            "options": { "discriminator_key": "kind" }
        }))
        .unwrap();

        assert_eq!(schema.discriminator_key(), "kind");
        assert_eq!(schema.required_paths(), vec!["message"]);
        let events = schema.paths().get("events").unwrap();
        assert!(events.ty().is_document_shaped());
        let element = events.ty().embedded_schema().unwrap();
        assert_eq!(element.paths().get("at").unwrap().ty().type_name(), "date");
    }

    #[test]
    fn bare_field_map_is_accepted() {
        let schema = Schema::from_value(&json!({
            "element": { "type": "string", "required": true },
            "count": { "type": "int", "default": 0 }
        }))
        .unwrap();
        assert_eq!(schema.paths().len(), 2);
        let count = schema.paths().get("count").unwrap();
        assert!(count.default().is_some());
    }

    #[test]
    fn non_object_definitions_are_rejected() {
        let err = Schema::from_value(&json!("not a definition")).unwrap_err();
        assert!(err.to_string().contains("invalid schema definition"));
    }

    #[test]
    fn unknown_type_tags_are_rejected() {
        let err = Schema::from_value(&json!({
            "fields": { "x": { "type": "decimal128" } }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Configuration(_)));
    }
}
