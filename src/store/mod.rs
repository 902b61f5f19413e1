//! Storage: the backend trait, an in-memory backend, and the
//! model-bound collection surface.
//!
//! A [`Database`] ties a model registry to a storage backend; a
//! [`Collection`] binds one compiled model to that backend and runs
//! the model's lifecycle chains around every operation. Discriminator
//! children share their root's collection, and a child-bound
//! collection only sees documents carrying its own tied value.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::document::{value_at, Document};
use crate::hooks;
use crate::model::{CompiledModel, ModelError, ModelRegistry, ModelResult};
use crate::projection::{self, FieldSelection};
use crate::schema::{Schema, TiedValue};

// ============================================================
// Backend
// ============================================================

/// Storage backend contract. Backends store raw JSON documents and
/// know nothing about schemas or models.
pub trait StorageBackend: Send + Sync {
    /// Read a document by id.
    fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, String>;

    /// Write a document under an id, inserting or replacing.
    fn write(&self, collection: &str, id: &str, document: Value) -> Result<(), String>;

    /// Delete a document by id. False when it was absent.
    fn delete(&self, collection: &str, id: &str) -> Result<bool, String>;

    /// All documents of a collection, in insertion order.
    fn list(&self, collection: &str) -> Result<Vec<Value>, String>;
}

/// In-memory backend.
#[derive(Default)]
pub struct InMemoryBackend {
    data: RwLock<HashMap<String, IndexMap<String, Value>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend::default()
    }

    /// Saves the full backend state to a file as JSON.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let snapshot = self.data.read().map_err(|e| e.to_string())?.clone();
        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
        tokio::fs::write(path, json).await.map_err(|e| e.to_string())
    }

    /// Loads backend state from a JSON file. A missing file yields an
    /// empty backend.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let data = serde_json::from_str(&json).map_err(|e| e.to_string())?;
                Ok(InMemoryBackend {
                    data: RwLock::new(data),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InMemoryBackend::new()),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn write(&self, collection: &str, id: &str, document: Value) -> Result<(), String> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        data.entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, String> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        Ok(data
            .get_mut(collection)
            .map(|c| c.shift_remove(id).is_some())
            .unwrap_or(false))
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================
// Database
// ============================================================

/// A model registry bound to a storage backend.
pub struct Database {
    registry: ModelRegistry,
    backend: Arc<dyn StorageBackend>,
}

impl Database {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Database {
            registry: ModelRegistry::new(),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Database::new(Arc::new(InMemoryBackend::new()))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Compiles and registers a model, returning its collection.
    pub fn model(&self, name: &str, schema: &Schema) -> ModelResult<Collection> {
        let model = self.registry.register(name, schema)?;
        Ok(self.collection(&model))
    }

    /// Collection for an already-registered model name.
    pub fn collection_for(&self, name: &str) -> ModelResult<Collection> {
        let model = self.registry.lookup_or_create(name, None)?;
        Ok(self.collection(&model))
    }

    /// Collection bound to a compiled model. Works for discriminator
    /// children too: they read and write their root's collection.
    pub fn collection(&self, model: &Arc<CompiledModel>) -> Collection {
        Collection {
            model: model.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// ============================================================
// Collection
// ============================================================

/// Options for [`Collection::find`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Dotted-path equality conditions, all of which must hold.
    pub filter: Option<Value>,
    /// Projection applied to each raw document before hydration.
    pub selection: Option<FieldSelection>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Options for [`Collection::update`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Permit the update to rewrite the discriminator key. The
    /// document is re-dispatched before validation, so the new
    /// variant's defaults and rules apply.
    pub overwrite_discriminator_key: bool,
}

/// Model-bound storage operations.
pub struct Collection {
    model: Arc<CompiledModel>,
    backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.model.name())
            .field("collection", &self.model.collection())
            .finish_non_exhaustive()
    }
}

impl Collection {
    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    /// Name of the backing storage collection.
    pub fn name(&self) -> &str {
        self.model.collection()
    }

    /// Builds an unsaved document through this collection's model.
    pub fn new_document(&self, raw: Value) -> Document {
        self.model.instantiate(raw)
    }

    /// Validates and persists a document. Runs the validate chains
    /// around validation, then the save chains around the write. A
    /// document without an id is assigned one first.
    pub async fn save(&self, doc: &mut Document) -> ModelResult<String> {
        if doc.model().schema().options().validate_before_save() {
            self.run_pre(doc, "validate").await?;
            doc.validate()?;
            self.run_post(doc, "validate").await?;
        }
        self.run_pre(doc, "save").await?;

        let id_field = doc.model().schema().id_field().to_string();
        let id = match doc.id() {
            Some(Value::String(stored)) => stored.clone(),
            Some(other) => other.to_string(),
            None => {
                let generated = Uuid::new_v4().to_string();
                doc.set(&id_field, Value::String(generated.clone()))?;
                generated
            }
        };
        self.backend
            .write(self.model.collection(), &id, doc.data().clone())
            .map_err(ModelError::Storage)?;
        debug!(collection = %self.model.collection(), id = %id, "saved document");

        self.run_post(doc, "save").await?;
        Ok(id)
    }

    /// Fetches a document by id, dispatching it to its variant. The
    /// init chains run on the hydrated document.
    pub async fn find_by_id(&self, id: &str) -> ModelResult<Option<Document>> {
        let Some(raw) = self
            .backend
            .read(self.model.collection(), id)
            .map_err(ModelError::Storage)?
        else {
            return Ok(None);
        };
        if !self.in_scope(&raw) {
            return Ok(None);
        }
        self.hydrate_with_init(raw).await.map(Some)
    }

    /// Fetches by id with a projection applied to the raw document
    /// before hydration. Dispatch and identity paths survive the
    /// projection regardless of the selection.
    pub async fn find_by_id_selected(
        &self,
        id: &str,
        selection: &FieldSelection,
    ) -> ModelResult<Option<Document>> {
        let Some(mut raw) = self
            .backend
            .read(self.model.collection(), id)
            .map_err(ModelError::Storage)?
        else {
            return Ok(None);
        };
        if !self.in_scope(&raw) {
            return Ok(None);
        }
        projection::project(selection, self.model.schema(), &mut raw);
        self.hydrate_with_init(raw).await.map(Some)
    }

    /// Lists documents matching the filter, in storage order.
    pub async fn find(&self, options: &FindOptions) -> ModelResult<Vec<Document>> {
        let raws = self
            .backend
            .list(self.model.collection())
            .map_err(ModelError::Storage)?;
        let mut out = Vec::new();
        let mut skipped = 0;
        for mut raw in raws {
            if !self.in_scope(&raw) || !matches_filter(&raw, options.filter.as_ref()) {
                continue;
            }
            if skipped < options.offset {
                skipped += 1;
                continue;
            }
            if options.limit.is_some_and(|limit| out.len() >= limit) {
                break;
            }
            if let Some(selection) = &options.selection {
                projection::project(selection, self.model.schema(), &mut raw);
            }
            out.push(self.hydrate_with_init(raw).await?);
        }
        Ok(out)
    }

    /// Counts documents matching the filter.
    pub async fn count(&self, filter: Option<&Value>) -> ModelResult<usize> {
        let raws = self
            .backend
            .list(self.model.collection())
            .map_err(ModelError::Storage)?;
        Ok(raws
            .iter()
            .filter(|raw| self.in_scope(raw) && matches_filter(raw, filter))
            .count())
    }

    /// Applies dotted-path updates to a stored document, validates the
    /// result, and writes it back. Save chains do not run here;
    /// validation always does. Rewriting the discriminator key fails
    /// validation unless the options permit it, in which case the
    /// document is re-dispatched first.
    pub async fn update(
        &self,
        id: &str,
        updates: &Value,
        options: UpdateOptions,
    ) -> ModelResult<Document> {
        let raw = self
            .backend
            .read(self.model.collection(), id)
            .map_err(ModelError::Storage)?
            .filter(|raw| self.in_scope(raw))
            .ok_or_else(|| ModelError::DocumentNotFound {
                collection: self.model.collection().to_string(),
                id: id.to_string(),
            })?;
        let mut doc = self.model.hydrate(raw)?;
        let Some(changes) = updates.as_object() else {
            return Err(ModelError::InvalidUpdate(format!(
                "expected an object, got {}",
                crate::schema::json_type_name(updates)
            )));
        };
        for (path, value) in changes {
            doc.set(path, value.clone())?;
        }
        if options.overwrite_discriminator_key {
            doc.redispatch();
        }
        doc.validate()?;
        self.backend
            .write(self.model.collection(), id, doc.data().clone())
            .map_err(ModelError::Storage)?;
        debug!(collection = %self.model.collection(), id = %id, "updated document");
        Ok(doc)
    }

    /// Removes a stored document, running the remove chains around the
    /// backend delete.
    pub async fn delete(&self, id: &str) -> ModelResult<bool> {
        let Some(raw) = self
            .backend
            .read(self.model.collection(), id)
            .map_err(ModelError::Storage)?
        else {
            return Ok(false);
        };
        if !self.in_scope(&raw) {
            return Ok(false);
        }
        let mut doc = self.model.hydrate(raw)?;
        self.run_pre(&mut doc, "remove").await?;
        let removed = self
            .backend
            .delete(self.model.collection(), id)
            .map_err(ModelError::Storage)?;
        self.run_post(&mut doc, "remove").await?;
        debug!(collection = %self.model.collection(), id = %id, "deleted document");
        Ok(removed)
    }

    async fn hydrate_with_init(&self, raw: Value) -> ModelResult<Document> {
        let mut doc = self.model.hydrate(raw)?;
        self.run_pre(&mut doc, "init").await?;
        self.run_post(&mut doc, "init").await?;
        Ok(doc)
    }

    /// A child-bound collection only sees documents tied to it; roots
    /// see everything.
    fn in_scope(&self, raw: &Value) -> bool {
        let Some(tied) = self.model.tied() else {
            return true;
        };
        let key = self.model.schema().discriminator_key();
        raw.get(key)
            .and_then(TiedValue::from_json)
            .map(|stored| &stored == tied)
            .unwrap_or(false)
    }

    async fn run_pre(&self, doc: &mut Document, operation: &str) -> ModelResult<()> {
        let schema = doc.model().schema().clone();
        hooks::run_chain(schema.hooks().pre(operation), doc)
            .await
            .map_err(|source| ModelError::Hook {
                phase: "pre",
                operation: operation.to_string(),
                source,
            })
    }

    async fn run_post(&self, doc: &mut Document, operation: &str) -> ModelResult<()> {
        let schema = doc.model().schema().clone();
        hooks::run_chain(schema.hooks().post(operation), doc)
            .await
            .map_err(|source| ModelError::Hook {
                phase: "post",
                operation: operation.to_string(),
                source,
            })
    }
}

fn matches_filter(raw: &Value, filter: Option<&Value>) -> bool {
    let Some(Value::Object(conditions)) = filter else {
        return true;
    };
    conditions
        .iter()
        .all(|(path, expected)| value_at(raw, path) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backend_round_trips_documents() {
        let backend = InMemoryBackend::new();
        backend
            .write("people", "p1", json!({"_id": "p1", "name": "Ada"}))
            .unwrap();
        let read = backend.read("people", "p1").unwrap();
        assert_eq!(read.unwrap()["name"], "Ada");
        assert_eq!(backend.read("people", "p2").unwrap(), None);
        assert!(backend.delete("people", "p1").unwrap());
        assert!(!backend.delete("people", "p1").unwrap());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let backend = InMemoryBackend::new();
        for i in 0..4 {
            backend
                .write("posts", &format!("id{i}"), json!({"n": i}))
                .unwrap();
        }
        let all = backend.list("posts").unwrap();
        let order: Vec<i64> = all.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(backend.list("missing").unwrap().is_empty());
    }

    #[test]
    fn filters_compare_dotted_paths() {
        let raw = json!({"name": "Ada", "job": {"title": "engineer"}});
        assert!(matches_filter(&raw, Some(&json!({"name": "Ada"}))));
        assert!(matches_filter(
            &raw,
            Some(&json!({"job.title": "engineer"}))
        ));
        assert!(!matches_filter(&raw, Some(&json!({"name": "Grace"}))));
        assert!(!matches_filter(&raw, Some(&json!({"missing": 1}))));
        assert!(matches_filter(&raw, None));
    }
}
