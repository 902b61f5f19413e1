//! Typed access to array paths: pushing and replacing elements runs
//! the same per-element preparation the document constructor uses, so
//! a dispatched element carries its variant defaults immediately.

use serde_json::Value;
use tracing::debug;

use crate::discriminator::DiscriminatorRegistry;
use crate::model::ModelError;
use crate::schema::{Schema, SchemaType, TiedValue};

use super::access::{ensure_path_mut, value_at};
use super::dispatch::{prepare_element, resolve_element_schema};
use super::Document;

/// Mutable handle over one declared array path of a document.
pub struct ArrayHandle<'a> {
    doc: &'a mut Document,
    path: String,
}

impl<'a> ArrayHandle<'a> {
    pub(crate) fn new(doc: &'a mut Document, path: String) -> Self {
        ArrayHandle { doc, path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn items(&self) -> Option<&Vec<Value>> {
        value_at(self.doc.data(), &self.path)?.as_array()
    }

    pub fn len(&self) -> usize {
        self.items().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View over the element at `index`, dispatched to its variant
    /// schema when the array holds discriminated documents.
    pub fn get(&self, index: usize) -> Option<ElementView<'_>> {
        let descriptor = self.doc.model().schema().paths().resolve(&self.path)?;
        let SchemaType::Array(element) = descriptor.ty() else {
            return None;
        };
        let item = self.items()?.get(index)?;
        Some(ElementView::over(
            item,
            element,
            descriptor.discriminators(),
            format!("{}[{}]", self.path, index),
        ))
    }

    /// Prepares a raw value as an element of this array without
    /// storing it: the value is dispatched and variant defaults are
    /// filled in, exactly as `push` would do.
    pub fn create_element(&self, raw: Value) -> Result<Value, ModelError> {
        let Some(descriptor) = self.doc.model().schema().paths().resolve(&self.path) else {
            return Err(ModelError::InvalidPath(self.path.clone()));
        };
        let SchemaType::Array(element) = descriptor.ty() else {
            return Err(ModelError::InvalidPath(self.path.clone()));
        };
        let mut value = raw;
        let mut issues = Vec::new();
        prepare_element(
            &mut value,
            element,
            descriptor.discriminators(),
            &format!("{}[{}]", self.path, self.len()),
            self.doc.model_name(),
            &mut issues,
        );
        for issue in &issues {
            debug!(
                path = %issue.path,
                value = %issue.value,
                model = %issue.model,
                "array element carries an unrecognized discriminator value"
            );
        }
        Ok(value)
    }

    /// Appends a prepared element and returns its index.
    pub fn push(&mut self, raw: Value) -> Result<usize, ModelError> {
        let value = self.create_element(raw)?;
        let index = self.len();
        let Some(slot) = ensure_path_mut(self.doc.data_mut(), &self.path) else {
            return Err(ModelError::InvalidPath(self.path.clone()));
        };
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        let Value::Array(items) = slot else {
            return Err(ModelError::InvalidPath(self.path.clone()));
        };
        items.push(value);
        Ok(index)
    }

    /// Replaces the element at `index` with a freshly prepared value.
    /// The replacement is dispatched on its own stored key, so an
    /// element may change variant this way.
    pub fn set(&mut self, index: usize, raw: Value) -> Result<(), ModelError> {
        let value = self.create_element(raw)?;
        let element_path = format!("{}.{}", self.path, index);
        let Some(slot) = super::access::value_at_mut(self.doc.data_mut(), &element_path) else {
            return Err(ModelError::InvalidPath(element_path));
        };
        *slot = value;
        Ok(())
    }
}

/// Read-only view of one embedded document with its effective schema.
pub struct ElementView<'a> {
    value: &'a Value,
    schema: Option<&'a Schema>,
    path: String,
}

impl<'a> ElementView<'a> {
    pub(crate) fn over(
        value: &'a Value,
        ty: &'a SchemaType,
        registry: Option<&'a DiscriminatorRegistry>,
        path: String,
    ) -> Self {
        let schema = match ty {
            SchemaType::Embedded(base) => {
                Some(resolve_element_schema(value, base, registry).unwrap_or(base))
            }
            _ => None,
        };
        ElementView {
            value,
            schema,
            path,
        }
    }

    pub(crate) fn plain(value: &'a Value, schema: &'a Schema, path: String) -> Self {
        ElementView {
            value,
            schema: Some(schema),
            path,
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Effective schema of this element, absent for scalar elements.
    pub fn schema(&self) -> Option<&'a Schema> {
        self.schema
    }

    /// Discriminator value the element's schema is tied to.
    pub fn kind(&self) -> Option<&'a TiedValue> {
        self.schema?.discriminator()?.value.as_ref()
    }

    pub fn get(&self, path: &str) -> Option<&'a Value> {
        value_at(self.value, path)
    }

    pub fn required_paths(&self) -> Vec<&'a str> {
        self.schema.map(Schema::required_paths).unwrap_or_default()
    }
}
