//! Discriminator registries and the registration preconditions shared
//! by model-level and embedded-path registration.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::schema::{Schema, SchemaOptions, TiedValue};

use super::errors::DiscriminatorError;

/// One registered child: its name, the stored value it is tied to, and
/// its fully-derived effective schema.
#[derive(Debug, Clone)]
pub struct DiscriminatorEntry {
    pub(crate) name: String,
    pub(crate) tied: TiedValue,
    pub(crate) schema: Arc<Schema>,
}

impl DiscriminatorEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tied(&self) -> &TiedValue {
        &self.tied
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// Registry of discriminator children for one document-shaped path.
/// Created lazily on first registration; entries keep registration
/// order.
#[derive(Debug, Clone)]
pub struct DiscriminatorRegistry {
    key: String,
    entries: IndexMap<String, DiscriminatorEntry>,
}

impl DiscriminatorRegistry {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        DiscriminatorRegistry {
            key: key.into(),
            entries: IndexMap::new(),
        }
    }

    /// The key field this registry dispatches on.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DiscriminatorEntry> {
        self.entries.values()
    }

    pub fn get(&self, name: &str) -> Option<&DiscriminatorEntry> {
        self.entries.get(name)
    }

    /// Finds the child tied to a stored value, comparing canonically.
    pub fn match_value(&self, value: &TiedValue) -> Option<&DiscriminatorEntry> {
        self.entries.values().find(|entry| entry.tied == *value)
    }

    pub(crate) fn insert(&mut self, entry: DiscriminatorEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }
}

/// Preconditions shared by every registration surface. Callers run
/// this to completion before touching any structure, which is what
/// makes registration atomic.
pub(crate) fn check_registration<'a>(
    owner: &str,
    key: &str,
    base_options: &SchemaOptions,
    existing: impl Iterator<Item = (&'a str, &'a TiedValue)>,
    name: &str,
    tied: &TiedValue,
    child: &Schema,
) -> Result<(), DiscriminatorError> {
    if child
        .discriminator()
        .is_some_and(|mapping| !mapping.is_root)
    {
        return Err(DiscriminatorError::NotRoot {
            name: name.to_string(),
        });
    }
    if child.paths().covers_segment(key) {
        return Err(DiscriminatorError::KeyCollision {
            name: name.to_string(),
            key: key.to_string(),
        });
    }
    for (existing_name, existing_tied) in existing {
        if existing_name == name {
            return Err(DiscriminatorError::DuplicateName {
                name: name.to_string(),
                owner: owner.to_string(),
            });
        }
        if existing_tied == tied {
            return Err(DiscriminatorError::DuplicateValue {
                value: tied.to_string(),
                existing: existing_name.to_string(),
                owner: owner.to_string(),
            });
        }
    }
    if let Some(option) = base_options.first_conflict_with(child.options()) {
        return Err(DiscriminatorError::NonCustomizableOption {
            name: name.to_string(),
            option,
        });
    }
    Ok(())
}
