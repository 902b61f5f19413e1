//! The schema itself: paths, hooks, methods, statics, virtuals,
//! indexes, and options.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discriminator::{DiscriminatorError, DiscriminatorMapping};
use crate::document::Document;
use crate::hooks::{HookFn, HookId, HookSet};
use crate::model::CompiledModel;

use super::errors::MethodError;
use super::options::SchemaOptions;
use super::path::{PathMap, SchemaPath};
use super::types::TiedValue;

/// Instance method installed on a schema.
pub type MethodFn = Arc<dyn Fn(&Document, &[Value]) -> Result<Value, MethodError> + Send + Sync>;

/// Model-level static installed on a schema.
pub type StaticFn =
    Arc<dyn Fn(&CompiledModel, &[Value]) -> Result<Value, MethodError> + Send + Sync>;

/// A computed path: read through a getter, optionally writable.
#[derive(Clone)]
pub struct Virtual {
    get: Arc<dyn Fn(&Document) -> Value + Send + Sync>,
    set: Option<Arc<dyn Fn(&mut Document, Value) + Send + Sync>>,
}

impl Virtual {
    pub fn getter<F>(get: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        Virtual {
            get: Arc::new(get),
            set: None,
        }
    }

    pub fn with_setter<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut Document, Value) + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(set));
        self
    }

    pub fn get(&self, doc: &Document) -> Value {
        (self.get)(doc)
    }

    /// Applies the setter if one exists. Returns false for read-only
    /// virtuals.
    pub fn set(&self, doc: &mut Document, value: Value) -> bool {
        match &self.set {
            Some(setter) => {
                setter(doc, value);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Virtual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Virtual")
            .field("writable", &self.set.is_some())
            .finish()
    }
}

/// Sort order for one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrder {
    Ascending,
    Descending,
}

/// Declarative index over one or more paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<(String, IndexOrder)>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        IndexSpec {
            fields: vec![(field.into(), IndexOrder::Ascending)],
            unique: false,
        }
    }

    pub fn compound(fields: Vec<(String, IndexOrder)>) -> Self {
        IndexSpec {
            fields,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A document schema.
///
/// Cloning shares the behavior tables: function handles are
/// reference-counted and hook registrations keep their identity, so a
/// cloned schema composed back onto its origin never duplicates a
/// chain.
#[derive(Clone, Default)]
pub struct Schema {
    pub(crate) paths: PathMap,
    pub(crate) hooks: HookSet,
    pub(crate) methods: IndexMap<String, MethodFn>,
    pub(crate) statics: IndexMap<String, StaticFn>,
    pub(crate) virtuals: IndexMap<String, Virtual>,
    pub(crate) indexes: Vec<IndexSpec>,
    pub(crate) options: SchemaOptions,
    pub(crate) discriminator: Option<DiscriminatorMapping>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn with_options(options: SchemaOptions) -> Self {
        Schema {
            options,
            ..Schema::default()
        }
    }

    // ============================================================
    // Builder surface
    // ============================================================

    /// Declares a path. See [`PathMap::insert`] for conflict handling.
    pub fn path(mut self, name: impl Into<String>, path: SchemaPath) -> Self {
        self.paths.insert(name, path);
        self
    }

    /// Mutating twin of [`path`](Schema::path).
    pub fn add_path(&mut self, name: impl Into<String>, path: SchemaPath) -> &mut Self {
        self.paths.insert(name, path);
        self
    }

    pub fn pre(mut self, operation: impl Into<String>, body: Arc<dyn HookFn>) -> Self {
        self.hooks.add_pre(operation, body);
        self
    }

    pub fn post(mut self, operation: impl Into<String>, body: Arc<dyn HookFn>) -> Self {
        self.hooks.add_post(operation, body);
        self
    }

    pub fn add_pre(&mut self, operation: impl Into<String>, body: Arc<dyn HookFn>) -> HookId {
        self.hooks.add_pre(operation, body)
    }

    pub fn add_post(&mut self, operation: impl Into<String>, body: Arc<dyn HookFn>) -> HookId {
        self.hooks.add_post(operation, body)
    }

    pub fn method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Document, &[Value]) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(body));
        self
    }

    pub fn static_method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&CompiledModel, &[Value]) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.statics.insert(name.into(), Arc::new(body));
        self
    }

    pub fn virtual_path(mut self, name: impl Into<String>, virtual_def: Virtual) -> Self {
        self.virtuals.insert(name.into(), virtual_def);
        self
    }

    pub fn index(mut self, spec: IndexSpec) -> Self {
        if !self.indexes.contains(&spec) {
            self.indexes.push(spec);
        }
        self
    }

    // ============================================================
    // Discriminators on embedded paths
    // ============================================================

    /// Registers a discriminator child on a document-shaped path,
    /// tying it to its name as the stored value.
    pub fn discriminator_at(
        &mut self,
        path: &str,
        name: &str,
        child: &Schema,
    ) -> Result<(), DiscriminatorError> {
        crate::discriminator::register_at_path(self, path, name, child, None)
    }

    /// Registers a discriminator child on a document-shaped path with
    /// an explicit tied value.
    pub fn discriminator_at_with_value(
        &mut self,
        path: &str,
        name: &str,
        child: &Schema,
        tied: TiedValue,
    ) -> Result<(), DiscriminatorError> {
        crate::discriminator::register_at_path(self, path, name, child, Some(tied))
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn paths(&self) -> &PathMap {
        &self.paths
    }

    pub(crate) fn paths_mut(&mut self) -> &mut PathMap {
        &mut self.paths
    }

    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn discriminator(&self) -> Option<&DiscriminatorMapping> {
        self.discriminator.as_ref()
    }

    pub(crate) fn set_discriminator(&mut self, mapping: DiscriminatorMapping) {
        self.discriminator = Some(mapping);
    }

    /// Effective key field consulted during dispatch.
    pub fn discriminator_key(&self) -> &str {
        match &self.discriminator {
            Some(mapping) => mapping.key.as_str(),
            None => self.options.discriminator_key(),
        }
    }

    pub fn id_field(&self) -> &str {
        self.options.id_field()
    }

    pub fn method_fn(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn static_fn(&self, name: &str) -> Option<&StaticFn> {
        self.statics.get(name)
    }

    pub fn static_names(&self) -> impl Iterator<Item = &str> {
        self.statics.keys().map(String::as_str)
    }

    pub fn virtual_named(&self, name: &str) -> Option<&Virtual> {
        self.virtuals.get(name)
    }

    pub fn virtuals(&self) -> impl Iterator<Item = (&str, &Virtual)> {
        self.virtuals.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Declared paths flagged required, in declaration order.
    pub fn required_paths(&self) -> Vec<&str> {
        self.paths.required_paths()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("paths", &self.paths)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .field("virtuals", &self.virtuals.keys().collect::<Vec<_>>())
            .field("indexes", &self.indexes)
            .field("options", &self.options)
            .field("discriminator", &self.discriminator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;
    use serde_json::json;

    #[test]
    fn builder_declares_paths_in_order() {
        let schema = Schema::new()
            .path("message", SchemaPath::required(SchemaType::String))
            .path("count", SchemaPath::new(SchemaType::Int));
        let names: Vec<&str> = schema.paths().names().collect();
        assert_eq!(names, vec!["message", "count"]);
        assert_eq!(schema.required_paths(), vec!["message"]);
    }

    #[test]
    fn methods_and_statics_are_retrievable_by_name() {
        let schema = Schema::new()
            .method("shout", |_doc, _args| Ok(json!("hey")))
            .static_method("count_all", |_model, _args| Ok(json!(0)));
        assert!(schema.method_fn("shout").is_some());
        assert!(schema.method_fn("whisper").is_none());
        assert!(schema.static_fn("count_all").is_some());
        assert_eq!(schema.method_names().collect::<Vec<_>>(), vec!["shout"]);
    }

    #[test]
    fn duplicate_index_specs_collapse() {
        let schema = Schema::new()
            .index(IndexSpec::ascending("name"))
            .index(IndexSpec::ascending("name"));
        assert_eq!(schema.indexes().len(), 1);
    }

    #[test]
    fn discriminator_key_falls_back_to_options() {
        let schema = Schema::with_options(SchemaOptions {
            discriminator_key: Some("kind".to_string()),
            ..Default::default()
        });
        assert_eq!(schema.discriminator_key(), "kind");
        assert_eq!(Schema::new().discriminator_key(), "__t");
    }
}
