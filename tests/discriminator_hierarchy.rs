//! Discriminator Hierarchy Tests
//!
//! Model-level discriminator invariants:
//! - Children inherit paths, options, and the root's collection
//! - Only roots may register children
//! - Names and tied values are unique per root, compared canonically
//! - A child schema may not redeclare the key or core options
//! - Failed registrations leave the hierarchy untouched
//! - Documents dispatch by stored key value

use polydoc::discriminator::DiscriminatorError;
use polydoc::model::ModelRegistry;
use polydoc::schema::{Schema, SchemaOptions, SchemaPath, SchemaType, TiedValue};
use serde_json::json;
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

fn event_schema() -> Schema {
    Schema::with_options(SchemaOptions {
        discriminator_key: Some("kind".to_string()),
        ..Default::default()
    })
    .path("message", SchemaPath::required(SchemaType::String))
}

fn clicked_schema() -> Schema {
    Schema::new().path("element", SchemaPath::required(SchemaType::String))
}

// =============================================================================
// Derivation Tests
// =============================================================================

/// A child inherits the base paths and adds its own.
#[test]
fn test_child_inherits_and_extends() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    let clicked = event.discriminator("Clicked", &clicked_schema()).unwrap();

    assert!(clicked.schema().paths().contains("message"));
    assert!(clicked.schema().paths().contains("element"));
    assert_eq!(clicked.collection(), "events");
    assert_eq!(clicked.discriminator_key(), "kind");
    assert_eq!(clicked.tied(), Some(&TiedValue::from("Clicked")));
    assert!(clicked.is_a("Event"));
    assert!(event.is_root());
    assert!(!clicked.is_root());
}

/// A child of a child is rejected.
#[test]
fn test_grandchildren_are_rejected() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    let clicked = event.discriminator("Clicked", &clicked_schema()).unwrap();

    let err = clicked.discriminator("Deeper", &Schema::new()).unwrap_err();
    assert!(matches!(err, DiscriminatorError::NotRoot { .. }));
    assert!(err
        .to_string()
        .contains("can only be a discriminator of the root model"));
}

/// A schema already derived for one root cannot be registered again.
#[test]
fn test_derived_schema_cannot_be_reused() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    let clicked = event.discriminator("Clicked", &clicked_schema()).unwrap();

    let other = registry.register("Other", &event_schema()).unwrap();
    let err = other
        .discriminator("Stolen", clicked.schema())
        .unwrap_err();
    assert!(matches!(err, DiscriminatorError::NotRoot { .. }));
}

// =============================================================================
// Uniqueness Tests
// =============================================================================

/// Duplicate child names are rejected.
#[test]
fn test_duplicate_names_are_rejected() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    event.discriminator("Clicked", &clicked_schema()).unwrap();

    let err = event
        .discriminator("Clicked", &Schema::new())
        .unwrap_err();
    assert!(matches!(err, DiscriminatorError::DuplicateName { .. }));
    assert_eq!(event.child_names(), vec!["Clicked".to_string()]);
}

/// Tied values are compared canonically: a uuid string and the same
/// uuid value collide.
#[test]
fn test_tied_values_compare_canonically() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();

    let id = Uuid::new_v4();
    event
        .discriminator_with_value("First", &Schema::new(), TiedValue::Uuid(id))
        .unwrap();
    let err = event
        .discriminator_with_value(
            "Second",
            &Schema::new(),
            TiedValue::from(id.to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, DiscriminatorError::DuplicateValue { .. }));

    // An integer value is distinct from its decimal string.
    event
        .discriminator_with_value("Third", &Schema::new(), TiedValue::Int(3))
        .unwrap();
    event
        .discriminator_with_value("Fourth", &Schema::new(), TiedValue::from("3"))
        .unwrap();

    // The same name and value under a different root do not conflict.
    let audit = registry.register("Audit", &event_schema()).unwrap();
    audit
        .discriminator_with_value("First", &Schema::new(), TiedValue::Uuid(id))
        .unwrap();
}

// =============================================================================
// Child Schema Restriction Tests
// =============================================================================

/// A child redeclaring the key field is rejected.
#[test]
fn test_child_cannot_declare_the_key() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    let offending = Schema::new().path("kind", SchemaPath::new(SchemaType::String));
    let err = event.discriminator("Bad", &offending).unwrap_err();
    assert!(matches!(err, DiscriminatorError::KeyCollision { .. }));
}

/// A child changing a core option is rejected; re-stating the
/// effective value is fine.
#[test]
fn test_child_cannot_change_core_options() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();

    let conflicting = Schema::with_options(SchemaOptions {
        strict: Some(false),
        ..Default::default()
    });
    let err = event.discriminator("Loose", &conflicting).unwrap_err();
    assert!(matches!(
        err,
        DiscriminatorError::NonCustomizableOption { option: "strict", .. }
    ));

    let agreeing = Schema::with_options(SchemaOptions {
        discriminator_key: Some("kind".to_string()),
        ..Default::default()
    });
    event.discriminator("Agreeing", &agreeing).unwrap();
}

/// A bad definition value reports the invalid-schema message.
#[test]
fn test_definition_must_be_a_valid_schema() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    let err = event
        .discriminator_from_value("Broken", &json!("nonsense"))
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("must pass a valid discriminator schema"));
}

// =============================================================================
// Dispatch Tests
// =============================================================================

/// Documents dispatch to the child tied to their stored key value.
#[test]
fn test_documents_dispatch_by_stored_value() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    event.discriminator("Clicked", &clicked_schema()).unwrap();
    event
        .discriminator_with_value(
            "Legacy",
            &Schema::new().path("code", SchemaPath::new(SchemaType::Int)),
            TiedValue::Int(7),
        )
        .unwrap();

    let doc = event.instantiate(json!({"message": "m", "kind": "Clicked"}));
    assert_eq!(doc.model_name(), "Clicked");

    let doc = event.instantiate(json!({"message": "m", "kind": 7}));
    assert_eq!(doc.model_name(), "Legacy");

    let doc = event.instantiate(json!({"message": "m"}));
    assert_eq!(doc.model_name(), "Event");
}

/// A dispatched instance behaves as its variant: overridden methods,
/// inherited methods, and the variant's required set all apply.
#[test]
fn test_dispatched_instances_take_variant_behavior() {
    let base = event_schema()
        .method("label", |_doc, _args| Ok(json!("event")))
        .method("excerpt", |doc, _args| {
            Ok(doc.get("message").cloned().unwrap_or(json!(null)))
        });
    let clicked = clicked_schema().method("label", |_doc, _args| Ok(json!("clicked")));

    let registry = ModelRegistry::new();
    let event = registry.register("Event", &base).unwrap();
    event.discriminator("Clicked", &clicked).unwrap();

    let doc = event.instantiate(json!({"message": "m", "kind": "Clicked", "element": "#x"}));
    assert_eq!(doc.call("label", &[]).unwrap(), json!("clicked"));
    assert_eq!(doc.call("excerpt", &[]).unwrap(), json!("m"));

    let root_doc = event.instantiate(json!({"message": "m"}));
    assert_eq!(root_doc.call("label", &[]).unwrap(), json!("event"));

    // The variant's required set governs validation.
    let incomplete = event.instantiate(json!({"message": "m", "kind": "Clicked"}));
    let err = incomplete.validate().unwrap_err();
    assert!(err.at("element").is_some());
}

/// Constructing through a child stamps the key into the data.
#[test]
fn test_child_construction_stamps_the_key() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    let clicked = event.discriminator("Clicked", &clicked_schema()).unwrap();

    let doc = clicked.instantiate(json!({"message": "m", "element": "#buy"}));
    assert_eq!(doc.get("kind"), Some(&json!("Clicked")));
    assert!(doc.validate().is_ok());
}

/// An unknown stored value hydrates to an error naming the value and
/// the model.
#[test]
fn test_unknown_value_fails_hydration() {
    let registry = ModelRegistry::new();
    let event = registry.register("Event", &event_schema()).unwrap();
    event.discriminator("Clicked", &clicked_schema()).unwrap();

    let err = event
        .hydrate(json!({"message": "m", "kind": "Tapped"}))
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("Discriminator \"Tapped\" not found for model \"Event\""));
}

// =============================================================================
// Registry Lifecycle Tests
// =============================================================================

/// Unregistering frees the name; matching removal reports what went.
#[test]
fn test_registry_unregister_and_remove_matching() {
    let registry = ModelRegistry::new();
    registry.register("Event", &event_schema()).unwrap();
    registry.register("EventArchive", &Schema::new()).unwrap();
    registry.register("Person", &Schema::new()).unwrap();

    assert!(registry.register("Event", &Schema::new()).is_err());
    assert!(registry.unregister("Event"));
    assert!(!registry.unregister("Event"));
    registry.register("Event", &event_schema()).unwrap();

    let removed = registry.remove_matching(&regex::Regex::new("^Event").unwrap());
    assert_eq!(
        removed,
        vec!["EventArchive".to_string(), "Event".to_string()]
    );
    assert_eq!(registry.names(), vec!["Person".to_string()]);
}
