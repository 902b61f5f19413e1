//! Compiled models.
//!
//! Compilation freezes a schema into a [`CompiledModel`]: the
//! effective schema behind an `Arc`, the ancestry chain for `is_a`
//! checks, the storage collection name, and the table of discriminator
//! children consulted during dispatch.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::discriminator::{
    check_registration, DiscriminatorError, DiscriminatorMapping,
};
use crate::document::Document;
use crate::model::ModelError;
use crate::schema::{compose_for_discriminator, Schema, TiedValue};

/// A schema compiled under a model name.
#[derive(Debug)]
pub struct CompiledModel {
    name: String,
    collection: String,
    schema: Arc<Schema>,
    /// Most-derived first; the final entry is the root.
    ancestors: Vec<String>,
    children: RwLock<IndexMap<String, Arc<CompiledModel>>>,
}

impl CompiledModel {
    /// Compiles a schema. The schema gains a root discriminator
    /// mapping if it has none, making the model eligible to own
    /// children.
    pub(crate) fn compile(name: &str, schema: &Schema) -> CompiledModel {
        let mut effective = schema.clone();
        if effective.discriminator().is_none() {
            let key = effective.options().discriminator_key().to_string();
            effective.set_discriminator(DiscriminatorMapping::root(key));
        }
        let collection = effective.options().collection_for(name);
        CompiledModel {
            name: name.to_string(),
            collection,
            schema: Arc::new(effective),
            ancestors: vec![name.to_string()],
            children: RwLock::new(IndexMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn discriminator_key(&self) -> &str {
        self.schema.discriminator_key()
    }

    /// The value this model is tied to; `None` for roots.
    pub fn tied(&self) -> Option<&TiedValue> {
        self.schema.discriminator().and_then(|m| m.value.as_ref())
    }

    pub fn is_root(&self) -> bool {
        self.schema
            .discriminator()
            .map(|m| m.is_root)
            .unwrap_or(true)
    }

    /// Ancestry chain, most-derived first. Roots list only themselves.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// True when this model is `name` or descends from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.ancestors.iter().any(|ancestor| ancestor == name)
    }

    pub fn child(&self, name: &str) -> Option<Arc<CompiledModel>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn children(&self) -> Vec<Arc<CompiledModel>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    // ============================================================
    // Discriminator registration
    // ============================================================

    /// Registers a discriminator child tied to its own name.
    pub fn discriminator(
        self: &Arc<Self>,
        name: &str,
        child: &Schema,
    ) -> Result<Arc<CompiledModel>, DiscriminatorError> {
        self.register_child(name, child, None)
    }

    /// Registers a discriminator child tied to an explicit value.
    pub fn discriminator_with_value(
        self: &Arc<Self>,
        name: &str,
        child: &Schema,
        tied: TiedValue,
    ) -> Result<Arc<CompiledModel>, DiscriminatorError> {
        self.register_child(name, child, Some(tied))
    }

    /// Registers a discriminator child from a JSON schema definition.
    pub fn discriminator_from_value(
        self: &Arc<Self>,
        name: &str,
        definition: &Value,
    ) -> Result<Arc<CompiledModel>, DiscriminatorError> {
        let child =
            Schema::from_value(definition).map_err(|err| DiscriminatorError::InvalidSchema {
                name: name.to_string(),
                detail: err.to_string(),
            })?;
        self.register_child(name, &child, None)
    }

    fn register_child(
        self: &Arc<Self>,
        name: &str,
        child: &Schema,
        tied: Option<TiedValue>,
    ) -> Result<Arc<CompiledModel>, DiscriminatorError> {
        if !self.is_root() {
            return Err(DiscriminatorError::NotRoot {
                name: name.to_string(),
            });
        }
        let key = self.schema.discriminator_key().to_string();
        let tied = tied.unwrap_or_else(|| TiedValue::String(name.to_string()));

        let mut children = self
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        check_registration(
            &self.name,
            &key,
            self.schema.options(),
            children
                .values()
                .filter_map(|c| c.tied().map(|t| (c.name.as_str(), t))),
            name,
            &tied,
            child,
        )?;

        let mut merged = compose_for_discriminator(&self.schema, child);
        merged.set_discriminator(DiscriminatorMapping::child(key, tied));

        let mut ancestors = vec![name.to_string()];
        ancestors.extend(self.ancestors.iter().cloned());

        let child_model = Arc::new(CompiledModel {
            name: name.to_string(),
            collection: self.collection.clone(),
            schema: Arc::new(merged),
            ancestors,
            children: RwLock::new(IndexMap::new()),
        });
        children.insert(name.to_string(), child_model.clone());
        debug!(model = %self.name, discriminator = %name, "registered discriminator");
        Ok(child_model)
    }

    // ============================================================
    // Dispatch and documents
    // ============================================================

    /// Resolves the effective model for a raw document by its stored
    /// key value. An absent or null key resolves to this model; a
    /// recognized value resolves to the matching child (or to this
    /// model when it is the child itself); an unrecognized value
    /// resolves to this model alongside the error.
    pub fn dispatch(
        self: &Arc<Self>,
        raw: &Value,
    ) -> (Arc<CompiledModel>, Option<DiscriminatorError>) {
        let key = self.schema.discriminator_key();
        let stored = match raw.get(key) {
            None | Some(Value::Null) => return (self.clone(), None),
            Some(value) => value,
        };
        let shown = stored
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| stored.to_string());
        let Some(tied) = TiedValue::from_json(stored) else {
            return (
                self.clone(),
                Some(DiscriminatorError::NotFound {
                    value: shown,
                    model: self.name.clone(),
                }),
            );
        };
        if self.tied() == Some(&tied) {
            return (self.clone(), None);
        }
        let children = self
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(child) = children.values().find(|c| c.tied() == Some(&tied)) {
            return (child.clone(), None);
        }
        (
            self.clone(),
            Some(DiscriminatorError::NotFound {
                value: shown,
                model: self.name.clone(),
            }),
        )
    }

    /// Builds a fresh document. Defaults are applied and embedded
    /// documents dispatched; an unrecognized discriminator value is
    /// left pending and surfaces at validation.
    pub fn instantiate(self: &Arc<Self>, raw: Value) -> Document {
        Document::new_fresh(self.clone(), raw)
    }

    /// Rebuilds a document from storage. Unlike [`instantiate`],
    /// an unrecognized discriminator value fails immediately.
    ///
    /// [`instantiate`]: CompiledModel::instantiate
    pub fn hydrate(self: &Arc<Self>, raw: Value) -> Result<Document, ModelError> {
        Document::from_stored(self.clone(), raw).map_err(ModelError::from)
    }

    /// Invokes a static installed on this model's schema.
    pub fn call_static(&self, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        match self.schema.static_fn(name) {
            Some(body) => body(self, args).map_err(ModelError::from),
            None => Err(ModelError::UnknownStatic(name.to_string())),
        }
    }
}
