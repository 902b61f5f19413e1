//! Process-scoped model registry.
//!
//! Compiled models are registered by name. Registration is explicit,
//! and so is removal; recompiling under a taken name is an error
//! rather than a silent replacement.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::schema::Schema;

use super::compiled::CompiledModel;
use super::errors::ModelError;

#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<IndexMap<String, Arc<CompiledModel>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry::default()
    }

    /// Compiles `schema` and registers it under `name`.
    pub fn register(&self, name: &str, schema: &Schema) -> Result<Arc<CompiledModel>, ModelError> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if models.contains_key(name) {
            return Err(ModelError::NameTaken(name.to_string()));
        }
        let model = Arc::new(CompiledModel::compile(name, schema));
        models.insert(name.to_string(), model.clone());
        debug!(model = %name, collection = %model.collection(), "registered model");
        Ok(model)
    }

    /// Returns the model registered under `name`, compiling and
    /// registering `schema` if the name is free. Looking up a free
    /// name without a schema is an error.
    pub fn lookup_or_create(
        &self,
        name: &str,
        schema: Option<&Schema>,
    ) -> Result<Arc<CompiledModel>, ModelError> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = models.get(name) {
            return Ok(model.clone());
        }
        let Some(schema) = schema else {
            return Err(ModelError::NotFound(name.to_string()));
        };
        let model = Arc::new(CompiledModel::compile(name, schema));
        models.insert(name.to_string(), model.clone());
        debug!(model = %name, "registered model on first lookup");
        Ok(model)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Removes one registration. Returns false when the name was not
    /// registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name)
            .is_some();
        if removed {
            debug!(model = %name, "unregistered model");
        }
        removed
    }

    /// Removes every registration whose name matches `pattern` and
    /// returns the removed names in registration order.
    pub fn remove_matching(&self, pattern: &Regex) -> Vec<String> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        let removed: Vec<String> = models
            .keys()
            .filter(|name| pattern.is_match(name))
            .cloned()
            .collect();
        for name in &removed {
            models.shift_remove(name);
            debug!(model = %name, "unregistered model");
        }
        removed
    }

    pub fn names(&self) -> Vec<String> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
