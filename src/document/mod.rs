//! Documents: live instances of a compiled model.
//!
//! A document pairs raw JSON data with the model it dispatched to.
//! Construction materializes the data (defaults, implicit arrays,
//! embedded dispatch); mutation goes through dotted paths or array
//! handles; validation walks the whole document and reports every
//! problem at once.

mod access;
mod array;
mod dispatch;
mod validate;

pub use array::{ArrayHandle, ElementView};
pub use validate::{ValidationEntry, ValidationError, ValidationKind};

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::discriminator::DiscriminatorError;
use crate::model::{CompiledModel, ModelError};
use crate::schema::{SchemaType, SerializeView, TiedValue};

pub(crate) use access::{remove_at, value_at};

use access::ensure_path_mut;
use dispatch::materialize_document;
use validate::validate_document;

/// A live document tied to the model variant its data dispatched to.
#[derive(Debug, Clone)]
pub struct Document {
    /// Model the document was created through; dispatch starts here.
    origin: Arc<CompiledModel>,
    /// Effective model after dispatch on the stored key.
    model: Arc<CompiledModel>,
    data: Value,
    /// Key value observed at construction, kept to detect later writes
    /// to the discriminator key.
    dispatched: Option<Value>,
    allow_kind_change: bool,
}

impl Document {
    /// Builds a fresh document from raw data. The discriminator key is
    /// stamped when the origin model is itself a child, defaults are
    /// filled in, and embedded documents are dispatched. A raw value
    /// carrying an unrecognized key is kept as-is and reported by
    /// [`validate`](Document::validate).
    pub(crate) fn new_fresh(origin: Arc<CompiledModel>, raw: Value) -> Document {
        let mut data = if raw.is_null() { json!({}) } else { raw };
        let (model, dispatch_err) = origin.dispatch(&data);
        if let Some(err) = &dispatch_err {
            debug!(
                model = %model.name(),
                error = %err,
                "fresh document keeps an unrecognized discriminator value"
            );
        }
        let key = model.schema().discriminator_key().to_string();
        if let Some(tied) = model.tied() {
            let absent = data.get(&key).map(Value::is_null).unwrap_or(true);
            if absent {
                if let Some(map) = data.as_object_mut() {
                    map.insert(key.clone(), tied.to_json());
                }
            }
        }
        let mut issues = Vec::new();
        materialize_document(&mut data, model.schema(), model.name(), "", &mut issues);
        for issue in &issues {
            debug!(
                path = %issue.path,
                value = %issue.value,
                model = %issue.model,
                "embedded discriminator value not recognized"
            );
        }
        let dispatched = data.get(&key).filter(|v| !v.is_null()).cloned();
        Document {
            origin,
            model,
            data,
            dispatched,
            allow_kind_change: false,
        }
    }

    /// Rebuilds a document from stored data. Unlike fresh construction
    /// an unrecognized discriminator value, top-level or embedded,
    /// fails immediately.
    pub(crate) fn from_stored(
        origin: Arc<CompiledModel>,
        raw: Value,
    ) -> Result<Document, ValidationError> {
        let mut data = if raw.is_null() { json!({}) } else { raw };
        let (model, dispatch_err) = origin.dispatch(&data);
        if let Some(DiscriminatorError::NotFound { value, model: owner }) = dispatch_err {
            warn!(model = %owner, value = %value, "stored discriminator value not registered");
            let entry = ValidationEntry::discriminator_not_found(
                model.schema().discriminator_key(),
                &value,
                &owner,
            );
            return Err(ValidationError::new(owner, vec![entry]));
        }
        let key = model.schema().discriminator_key().to_string();
        let mut issues = Vec::new();
        materialize_document(&mut data, model.schema(), model.name(), "", &mut issues);
        if !issues.is_empty() {
            for issue in &issues {
                warn!(
                    path = %issue.path,
                    value = %issue.value,
                    model = %issue.model,
                    "stored discriminator value not registered"
                );
            }
            let entries = issues
                .iter()
                .map(|issue| {
                    ValidationEntry::discriminator_not_found(&issue.path, &issue.value, &issue.model)
                })
                .collect();
            return Err(ValidationError::new(model.name(), entries));
        }
        let dispatched = data.get(&key).filter(|v| !v.is_null()).cloned();
        Ok(Document {
            origin,
            model,
            data,
            dispatched,
            allow_kind_change: false,
        })
    }

    /// Re-runs dispatch against the current data, rebuilding the
    /// document as if freshly constructed. The kind-change permit is
    /// cleared and the key snapshot reset to the current value.
    pub fn redispatch(&mut self) {
        let origin = self.origin.clone();
        let data = std::mem::take(&mut self.data);
        *self = Document::new_fresh(origin, data);
    }

    // ============================================================
    // Identity
    // ============================================================

    /// Effective model this document dispatched to.
    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Discriminator value of the effective model, absent for roots.
    pub fn kind(&self) -> Option<&TiedValue> {
        self.model.tied()
    }

    /// Whether the effective model is `name` or derives from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.model.is_a(name)
    }

    /// Stored identifier, if one has been assigned.
    pub fn id(&self) -> Option<&Value> {
        self.data
            .get(self.model.schema().id_field())
            .filter(|v| !v.is_null())
    }

    // ============================================================
    // Data access
    // ============================================================

    pub fn get(&self, path: &str) -> Option<&Value> {
        value_at(&self.data, path)
    }

    /// Writes a dotted path, creating intermediate objects as needed.
    /// Array indexes must already exist; writing through a scalar
    /// fails.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), ModelError> {
        let Some(slot) = ensure_path_mut(&mut self.data, path) else {
            return Err(ModelError::InvalidPath(path.to_string()));
        };
        *slot = value;
        Ok(())
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// Handle over a declared array path.
    pub fn array(&mut self, path: &str) -> Result<ArrayHandle<'_>, ModelError> {
        {
            let Some(descriptor) = self.model.schema().paths().resolve(path) else {
                return Err(ModelError::InvalidPath(path.to_string()));
            };
            if !matches!(descriptor.ty(), SchemaType::Array(_)) {
                return Err(ModelError::InvalidPath(path.to_string()));
            }
        }
        Ok(ArrayHandle::new(self, path.to_string()))
    }

    /// View of a single embedded document with its effective variant
    /// schema. Array elements are reached through [`array`] instead.
    ///
    /// [`array`]: Document::array
    pub fn embedded(&self, path: &str) -> Option<ElementView<'_>> {
        let descriptor = self.model.schema().paths().resolve(path)?;
        if !matches!(descriptor.ty(), SchemaType::Embedded(_)) {
            return None;
        }
        let value = value_at(&self.data, path)?;
        Some(ElementView::over(
            value,
            descriptor.ty(),
            descriptor.discriminators(),
            path.to_string(),
        ))
    }

    // ============================================================
    // Behavior
    // ============================================================

    /// Invokes an instance method installed on the effective schema.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        match self.model.schema().method_fn(name) {
            Some(body) => body(self, args).map_err(ModelError::from),
            None => Err(ModelError::UnknownMethod(name.to_string())),
        }
    }

    /// Computes a virtual path.
    pub fn virtual_get(&self, name: &str) -> Option<Value> {
        self.model
            .schema()
            .virtual_named(name)
            .map(|virtual_def| virtual_def.get(self))
    }

    /// Applies a virtual setter. False when the virtual is unknown or
    /// read-only.
    pub fn virtual_set(&mut self, name: &str, value: Value) -> bool {
        let Some(virtual_def) = self.model.schema().virtual_named(name).cloned() else {
            return false;
        };
        virtual_def.set(self, value)
    }

    // ============================================================
    // Kind protection
    // ============================================================

    /// Permits the next validation to accept a rewritten discriminator
    /// key. Cleared again by [`redispatch`](Document::redispatch).
    pub fn allow_kind_change(&mut self) {
        self.allow_kind_change = true;
    }

    pub(crate) fn kind_change_allowed(&self) -> bool {
        self.allow_kind_change
    }

    // ============================================================
    // Validation
    // ============================================================

    /// Validates the current data against the effective schema,
    /// collecting every failure. Checks, in order: discriminator key
    /// rewrites, top-level dispatch of the current key value, then the
    /// full schema walk (required, types, validators, strict mode,
    /// embedded dispatch).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut entries = Vec::new();
        let key = self.model.schema().discriminator_key();

        let current = self.data.get(key).filter(|v| !v.is_null());
        if !self.allow_kind_change && current != self.dispatched.as_ref() {
            entries.push(ValidationEntry::key_protected(key, key));
        }

        let (_, dispatch_err) = self.origin.dispatch(&self.data);
        if let Some(DiscriminatorError::NotFound { value, model }) = dispatch_err {
            entries.push(ValidationEntry::discriminator_not_found(key, &value, &model));
        }

        validate_document(
            &self.data,
            self.model.schema(),
            self.model.name(),
            "",
            &mut entries,
        );

        let mut seen = HashSet::new();
        entries.retain(|entry| seen.insert(entry.clone()));
        if entries.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.model.name(), entries))
        }
    }

    // ============================================================
    // Serialization
    // ============================================================

    /// Data rendered through the schema's JSON view.
    pub fn to_json_value(&self) -> Value {
        self.rendered(self.model.schema().options().to_json.as_ref())
    }

    /// Data rendered through the schema's plain-object view.
    pub fn to_object_value(&self) -> Value {
        self.rendered(self.model.schema().options().to_object.as_ref())
    }

    fn rendered(&self, view: Option<&SerializeView>) -> Value {
        let mut out = self.data.clone();
        let Some(view) = view else {
            return out;
        };
        if view.virtuals {
            for (name, virtual_def) in self.model.schema().virtuals() {
                let computed = virtual_def.get(self);
                if let Some(slot) = ensure_path_mut(&mut out, name) {
                    *slot = computed;
                }
            }
        }
        for path in &view.hide {
            remove_at(&mut out, path);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SchemaOptions, SchemaPath, Virtual};

    fn event_element() -> Schema {
        Schema::with_options(SchemaOptions {
            discriminator_key: Some("kind".to_string()),
            ..Default::default()
        })
        .path("message", SchemaPath::required(SchemaType::String))
    }

    fn log_model() -> Arc<CompiledModel> {
        let clicked = Schema::new().path("element", SchemaPath::required(SchemaType::String));
        let mut root = Schema::new().path(
            "events",
            SchemaPath::new(SchemaType::array_of(SchemaType::document(event_element()))),
        );
        root.discriminator_at("events", "Clicked", &clicked).unwrap();
        Arc::new(CompiledModel::compile("Log", &root))
    }

    fn person_model() -> Arc<CompiledModel> {
        let root = Schema::with_options(SchemaOptions {
            discriminator_key: Some("role".to_string()),
            ..Default::default()
        })
        .path("name", SchemaPath::required(SchemaType::String));
        Arc::new(CompiledModel::compile("Person", &root))
    }

    #[test]
    fn child_construction_stamps_the_key() {
        let person = person_model();
        let admin = person
            .discriminator(
                "Admin",
                &Schema::new().path("level", SchemaPath::new(SchemaType::Int)),
            )
            .unwrap();
        let doc = admin.instantiate(json!({"name": "Ada"}));
        assert_eq!(doc.get("role"), Some(&json!("Admin")));
        assert_eq!(doc.model_name(), "Admin");
        assert!(doc.is_a("Person"));
        assert_eq!(doc.kind(), Some(&TiedValue::from("Admin")));
    }

    #[test]
    fn root_construction_dispatches_on_stored_key() {
        let person = person_model();
        person
            .discriminator(
                "Admin",
                &Schema::new().path("level", SchemaPath::new(SchemaType::Int)),
            )
            .unwrap();
        let doc = person.instantiate(json!({"name": "Ada", "role": "Admin", "level": 3}));
        assert_eq!(doc.model_name(), "Admin");
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn unknown_key_is_kept_and_surfaces_at_validation() {
        let person = person_model();
        let doc = person.instantiate(json!({"name": "Ada", "role": "Ghost"}));
        assert_eq!(doc.model_name(), "Person");
        let err = doc.validate().unwrap_err();
        assert!(err.has(ValidationKind::DiscriminatorNotFound));
        assert_eq!(
            err.at("role").unwrap().message,
            "Discriminator \"Ghost\" not found for model \"Person\""
        );
    }

    #[test]
    fn hydration_rejects_unknown_keys_immediately() {
        let person = person_model();
        let err = person
            .hydrate(json!({"name": "Ada", "role": "Ghost"}))
            .unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }

    #[test]
    fn rewriting_the_key_is_flagged_until_allowed() {
        let person = person_model();
        person
            .discriminator("Admin", &Schema::new())
            .unwrap();
        person
            .discriminator("Guest", &Schema::new())
            .unwrap();
        let mut doc = person.instantiate(json!({"name": "Ada", "role": "Admin"}));
        doc.set("role", json!("Guest")).unwrap();
        let err = doc.validate().unwrap_err();
        assert!(err.has(ValidationKind::DiscriminatorKeyProtected));
        assert_eq!(
            err.at("role").unwrap().message,
            "Can't set discriminator key \"role\""
        );

        doc.allow_kind_change();
        assert!(doc.validate().is_ok());
        doc.redispatch();
        assert_eq!(doc.model_name(), "Guest");
        assert!(!doc.kind_change_allowed());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn setting_the_same_key_value_is_not_a_rewrite() {
        let person = person_model();
        person.discriminator("Admin", &Schema::new()).unwrap();
        let mut doc = person.instantiate(json!({"name": "Ada", "role": "Admin"}));
        doc.set("role", json!("Admin")).unwrap();
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn embedded_views_resolve_variants() {
        let log = log_model();
        let mut doc = log.instantiate(json!({}));
        {
            let mut events = doc.array("events").unwrap();
            events
                .push(json!({"kind": "Clicked", "message": "m", "element": "#buy"}))
                .unwrap();
        }
        assert!(doc.validate().is_ok());
        let events = doc.array("events").unwrap();
        let view = events.get(0).unwrap();
        assert_eq!(view.kind(), Some(&TiedValue::from("Clicked")));
        assert_eq!(view.get("element"), Some(&json!("#buy")));
    }

    #[test]
    fn methods_and_virtuals_run_against_the_effective_schema() {
        let schema = Schema::new()
            .path("first", SchemaPath::new(SchemaType::String))
            .path("last", SchemaPath::new(SchemaType::String))
            .method("initials", |doc, _args| {
                let first = doc.get("first").and_then(Value::as_str).unwrap_or("");
                let last = doc.get("last").and_then(Value::as_str).unwrap_or("");
                Ok(json!(format!(
                    "{}{}",
                    first.chars().next().unwrap_or('?'),
                    last.chars().next().unwrap_or('?')
                )))
            })
            .virtual_path(
                "full_name",
                Virtual::getter(|doc| {
                    let first = doc.get("first").and_then(Value::as_str).unwrap_or("");
                    let last = doc.get("last").and_then(Value::as_str).unwrap_or("");
                    json!(format!("{first} {last}"))
                })
                .with_setter(|doc, value| {
                    if let Some(s) = value.as_str() {
                        if let Some((first, last)) = s.split_once(' ') {
                            let _ = doc.set("first", json!(first));
                            let _ = doc.set("last", json!(last));
                        }
                    }
                }),
            );
        let model = Arc::new(CompiledModel::compile("Person", &schema));
        let mut doc = model.instantiate(json!({"first": "Ada", "last": "Lovelace"}));
        assert_eq!(doc.call("initials", &[]).unwrap(), json!("AL"));
        assert!(doc.call("missing", &[]).is_err());
        assert_eq!(doc.virtual_get("full_name"), Some(json!("Ada Lovelace")));
        assert!(doc.virtual_set("full_name", json!("Grace Hopper")));
        assert_eq!(doc.get("first"), Some(&json!("Grace")));
    }

    #[test]
    fn views_render_virtuals_and_hide_paths() {
        let schema = Schema::with_options(SchemaOptions {
            to_json: Some(SerializeView {
                virtuals: true,
                hide: vec!["secret".to_string()],
            }),
            ..Default::default()
        })
        .path("name", SchemaPath::new(SchemaType::String))
        .path("secret", SchemaPath::new(SchemaType::String))
        .virtual_path(
            "loud",
            Virtual::getter(|doc| {
                json!(doc
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_uppercase())
            }),
        );
        let model = Arc::new(CompiledModel::compile("Spy", &schema));
        let doc = model.instantiate(json!({"name": "Bond", "secret": "007"}));
        let out = doc.to_json_value();
        assert_eq!(out.get("loud"), Some(&json!("BOND")));
        assert_eq!(out.get("secret"), None);
        // the plain-object view has no configuration and passes through
        assert_eq!(doc.to_object_value().get("secret"), Some(&json!("007")));
    }
}
