//! Value types storable at schema paths.
//!
//! Supported types:
//! - string: UTF-8 string
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - bool: Boolean
//! - date: RFC 3339 timestamp stored as a string
//! - mixed: opaque, never validated below this point
//! - document: embedded document with its own schema
//! - array: homogeneous array with an element type

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use super::schema::Schema;

/// The type stored at a single schema path.
#[derive(Debug, Clone)]
pub enum SchemaType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point (accepts any JSON number)
    Float,
    /// Boolean
    Bool,
    /// RFC 3339 timestamp, stored as a string
    Date,
    /// Anything at all; validation never descends into a mixed value
    Mixed,
    /// Embedded document with its own schema
    Embedded(Box<Schema>),
    /// Homogeneous array with an element type
    Array(Box<SchemaType>),
}

impl SchemaType {
    /// Embedded document type carrying `schema`.
    pub fn document(schema: Schema) -> SchemaType {
        SchemaType::Embedded(Box::new(schema))
    }

    /// Array type with `element` as its element type.
    pub fn array_of(element: SchemaType) -> SchemaType {
        SchemaType::Array(Box::new(element))
    }

    /// Human-readable type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Int => "int",
            SchemaType::Float => "float",
            SchemaType::Bool => "bool",
            SchemaType::Date => "date",
            SchemaType::Mixed => "mixed",
            SchemaType::Embedded(_) => "document",
            SchemaType::Array(_) => "array",
        }
    }

    /// Shallow conformance check. Embedded and array values are only
    /// checked for their container shape here; the validation walker
    /// descends into them.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            SchemaType::Int => value.is_i64() || value.is_u64(),
            SchemaType::Float => value.is_number(),
            SchemaType::Bool => value.is_boolean(),
            SchemaType::Date => value
                .as_str()
                .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            SchemaType::Mixed => true,
            SchemaType::Embedded(_) => value.is_object(),
            SchemaType::Array(_) => value.is_array(),
        }
    }

    /// Strips array nesting down to the element type. For non-array
    /// types this is the type itself.
    pub fn innermost(&self) -> &SchemaType {
        let mut ty = self;
        while let SchemaType::Array(element) = ty {
            ty = element;
        }
        ty
    }

    pub(crate) fn innermost_mut(&mut self) -> &mut SchemaType {
        let mut ty = self;
        while let SchemaType::Array(element) = ty {
            ty = element;
        }
        ty
    }

    /// Whether the innermost type is an embedded document. Only
    /// document-shaped paths can carry discriminators.
    pub fn is_document_shaped(&self) -> bool {
        matches!(self.innermost(), SchemaType::Embedded(_))
    }

    /// The embedded schema at the innermost position, if any.
    pub fn embedded_schema(&self) -> Option<&Schema> {
        match self.innermost() {
            SchemaType::Embedded(schema) => Some(schema),
            _ => None,
        }
    }
}

/// JSON type name for validation messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================
// Tied values
// ============================================================

/// A value a discriminator child is tied to in the stored key field.
///
/// Equality and hashing go through a canonical form so that a UUID
/// stored as a string matches the same UUID held natively, regardless
/// of hyphenation case.
#[derive(Debug, Clone)]
pub enum TiedValue {
    String(String),
    Int(i64),
    Uuid(Uuid),
}

#[derive(PartialEq, Hash)]
enum Canonical<'a> {
    Int(i64),
    Text(&'a str),
    Uuid(Uuid),
}

impl TiedValue {
    fn canonical(&self) -> Canonical<'_> {
        match self {
            TiedValue::Int(i) => Canonical::Int(*i),
            TiedValue::Uuid(u) => Canonical::Uuid(*u),
            TiedValue::String(s) => match Uuid::parse_str(s) {
                Ok(u) => Canonical::Uuid(u),
                Err(_) => Canonical::Text(s),
            },
        }
    }

    /// Reads a tied value out of a stored key field. Only strings and
    /// integer numbers are usable as discriminator values.
    pub fn from_json(value: &Value) -> Option<TiedValue> {
        match value {
            Value::String(s) => Some(TiedValue::String(s.clone())),
            Value::Number(n) => n.as_i64().map(TiedValue::Int),
            _ => None,
        }
    }

    /// The JSON representation written into the key field.
    pub fn to_json(&self) -> Value {
        match self {
            TiedValue::String(s) => Value::String(s.clone()),
            TiedValue::Int(i) => Value::Number((*i).into()),
            TiedValue::Uuid(u) => Value::String(u.as_hyphenated().to_string()),
        }
    }
}

impl PartialEq for TiedValue {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for TiedValue {}

impl Hash for TiedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.canonical() {
            Canonical::Int(i) => {
                state.write_u8(0);
                i.hash(state);
            }
            Canonical::Text(s) => {
                state.write_u8(1);
                s.hash(state);
            }
            Canonical::Uuid(u) => {
                state.write_u8(2);
                u.hash(state);
            }
        }
    }
}

impl fmt::Display for TiedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiedValue::String(s) => write!(f, "{s}"),
            TiedValue::Int(i) => write!(f, "{i}"),
            TiedValue::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<&str> for TiedValue {
    fn from(s: &str) -> Self {
        TiedValue::String(s.to_string())
    }
}

impl From<String> for TiedValue {
    fn from(s: String) -> Self {
        TiedValue::String(s)
    }
}

impl From<i64> for TiedValue {
    fn from(i: i64) -> Self {
        TiedValue::Int(i)
    }
}

impl From<Uuid> for TiedValue {
    fn from(u: Uuid) -> Self {
        TiedValue::Uuid(u)
    }
}

// ============================================================
// Defaults and validators
// ============================================================

/// Default applied to an absent path when a document is materialized.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed JSON value, cloned into place.
    Literal(Value),
    /// A generator invoked once per materialization.
    Generated(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Generator producing the current time as an RFC 3339 string.
    pub fn now() -> Self {
        DefaultValue::Generated(Arc::new(|| Value::String(Utc::now().to_rfc3339())))
    }

    /// Generator producing a fresh v4 UUID string.
    pub fn uuid() -> Self {
        DefaultValue::Generated(Arc::new(|| {
            Value::String(Uuid::new_v4().as_hyphenated().to_string())
        }))
    }

    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Literal(v) => v.clone(),
            DefaultValue::Generated(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        DefaultValue::Literal(value)
    }
}

/// A custom per-path validator with the message reported on failure.
#[derive(Clone)]
pub struct Validator {
    message: String,
    predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Validator {
    pub fn new<F>(message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Validator {
            message: message.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Validator passing string values that match `pattern`.
    pub fn matches(pattern: Regex, message: impl Into<String>) -> Self {
        Validator {
            message: message.into(),
            predicate: Arc::new(move |value| {
                value.as_str().map(|s| pattern.is_match(s)).unwrap_or(false)
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
