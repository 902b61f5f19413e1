//! Schema-level options.
//!
//! Options are tri-state: `None` means "not set here", and effective
//! values fall back to crate defaults. Merging only ever copies
//! explicitly-set values, which is what lets discriminator children
//! detect genuine conflicts with their root.

use serde::{Deserialize, Serialize};

/// Key field consulted during dispatch when a schema does not name one.
pub const DEFAULT_DISCRIMINATOR_KEY: &str = "__t";

/// Identifier field assigned on first save.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Controls what a serialized view of a document contains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeView {
    /// Include computed virtual paths in the output.
    pub virtuals: bool,
    /// Dotted paths stripped from the output.
    pub hide: Vec<String>,
}

/// Options attached to a [`Schema`](super::Schema).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Field name holding the discriminator value. Defaults to `__t`.
    pub discriminator_key: Option<String>,
    /// Field name holding the document identifier. Defaults to `_id`.
    pub id_field: Option<String>,
    /// Storage collection name. Defaults to the lowercased model name
    /// with an `s` suffix.
    pub collection: Option<String>,
    /// Reject undeclared fields during validation. Defaults to true.
    pub strict: Option<bool>,
    /// Run validation inside save. Defaults to true.
    pub validate_before_save: Option<bool>,
    /// View used by JSON serialization.
    pub to_json: Option<SerializeView>,
    /// View used by plain-object serialization.
    pub to_object: Option<SerializeView>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        SchemaOptions::default()
    }

    pub fn discriminator_key(&self) -> &str {
        self.discriminator_key
            .as_deref()
            .unwrap_or(DEFAULT_DISCRIMINATOR_KEY)
    }

    pub fn id_field(&self) -> &str {
        self.id_field.as_deref().unwrap_or(DEFAULT_ID_FIELD)
    }

    pub fn strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }

    pub fn validate_before_save(&self) -> bool {
        self.validate_before_save.unwrap_or(true)
    }

    /// Collection name for a model compiled from this schema.
    pub fn collection_for(&self, model_name: &str) -> String {
        match &self.collection {
            Some(name) => name.clone(),
            None => format!("{}s", model_name.to_lowercase()),
        }
    }

    /// Overlay for plain schema composition: every option explicitly
    /// set on `addition` wins.
    pub(crate) fn overlay(&self, addition: &SchemaOptions) -> SchemaOptions {
        SchemaOptions {
            discriminator_key: addition
                .discriminator_key
                .clone()
                .or_else(|| self.discriminator_key.clone()),
            id_field: addition.id_field.clone().or_else(|| self.id_field.clone()),
            collection: addition
                .collection
                .clone()
                .or_else(|| self.collection.clone()),
            strict: addition.strict.or(self.strict),
            validate_before_save: addition.validate_before_save.or(self.validate_before_save),
            to_json: addition.to_json.clone().or_else(|| self.to_json.clone()),
            to_object: addition
                .to_object
                .clone()
                .or_else(|| self.to_object.clone()),
        }
    }

    /// Overlay for discriminator derivation. Identical to [`overlay`]
    /// except that serialization views are never copied down from the
    /// base: a child either customizes its own views or has none.
    ///
    /// [`overlay`]: SchemaOptions::overlay
    pub(crate) fn overlay_for_discriminator(&self, child: &SchemaOptions) -> SchemaOptions {
        let mut merged = self.overlay(child);
        merged.to_json = child.to_json.clone();
        merged.to_object = child.to_object.clone();
        merged
    }

    /// First option explicitly set on `child` that a discriminator is
    /// not allowed to change, or `None` when the child is compatible.
    /// Serialization views are the documented exception and are never
    /// reported here.
    pub(crate) fn first_conflict_with(&self, child: &SchemaOptions) -> Option<&'static str> {
        if child
            .discriminator_key
            .as_deref()
            .is_some_and(|k| k != self.discriminator_key())
        {
            return Some("discriminator_key");
        }
        if child
            .id_field
            .as_deref()
            .is_some_and(|f| f != self.id_field())
        {
            return Some("id_field");
        }
        if let (Some(child_c), base_c) = (&child.collection, &self.collection) {
            if base_c.as_ref() != Some(child_c) {
                return Some("collection");
            }
        }
        if child.strict.is_some_and(|s| s != self.strict()) {
            return Some("strict");
        }
        if child
            .validate_before_save
            .is_some_and(|v| v != self.validate_before_save())
        {
            return Some("validate_before_save");
        }
        None
    }
}
