//! Field selection.
//!
//! Projections are declarative include/exclude lists of dotted paths.
//! They are applied to raw stored documents before hydration, so they
//! must never strip the fields dispatch and identity depend on: the
//! discriminator key at every level that dispatches, and the id field.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::remove_at;
use crate::schema::Schema;

/// Declarative projection over dotted paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSelection {
    /// Keep only the named paths (plus protected paths).
    Include(Vec<String>),
    /// Drop the named paths unless a protected path lives under them.
    Exclude(Vec<String>),
}

impl FieldSelection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSelection::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSelection::Exclude(fields.into_iter().map(Into::into).collect())
    }
}

/// Every path dispatch reads: the schema's own key plus the key of
/// each embedded registry, at its dotted position, recursively through
/// variant schemas.
pub fn dispatch_paths(schema: &Schema) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    paths.insert(schema.discriminator_key().to_string());
    collect_embedded_keys(schema, "", &mut paths);
    paths
}

/// Dispatch paths plus the identifier field.
pub fn always_included(schema: &Schema) -> BTreeSet<String> {
    let mut paths = dispatch_paths(schema);
    paths.insert(schema.id_field().to_string());
    paths
}

fn collect_embedded_keys(schema: &Schema, prefix: &str, out: &mut BTreeSet<String>) {
    for (name, descriptor) in schema.paths().iter() {
        let qualified = join(prefix, name);
        if let Some(registry) = descriptor.discriminators() {
            out.insert(format!("{qualified}.{}", registry.key()));
            for entry in registry.entries() {
                collect_embedded_keys(entry.schema(), &qualified, out);
            }
        }
        if let Some(base) = descriptor.ty().embedded_schema() {
            collect_embedded_keys(base, &qualified, out);
        }
    }
}

/// Applies a selection to raw document data, keeping `protected`
/// paths alive in both modes.
pub fn apply(selection: &FieldSelection, data: &mut Value, protected: &BTreeSet<String>) {
    match selection {
        FieldSelection::Include(fields) => {
            let mut kept: BTreeSet<String> = fields.iter().cloned().collect();
            for path in protected {
                if protection_applies(path, &kept) {
                    kept.insert(path.clone());
                }
            }
            retain_paths(data, "", &kept);
        }
        FieldSelection::Exclude(fields) => {
            for path in fields {
                let shielded = protected
                    .iter()
                    .any(|p| p == path || is_strictly_below(p, path));
                if !shielded {
                    remove_at(data, path);
                }
            }
        }
    }
}

/// Applies a selection under the schema's own protected set.
pub fn project(selection: &FieldSelection, schema: &Schema, data: &mut Value) {
    apply(selection, data, &always_included(schema));
}

/// A nested protected path only matters when its parent subtree
/// survives the selection at all; top-level protected paths always do.
fn protection_applies(path: &str, kept: &BTreeSet<String>) -> bool {
    let Some((parent, _)) = path.rsplit_once('.') else {
        return true;
    };
    kept.iter().any(|k| {
        k == parent || is_strictly_below(k, parent) || is_strictly_below(parent, k)
    })
}

fn retain_paths(value: &mut Value, prefix: &str, kept: &BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            let fields: Vec<String> = map.keys().cloned().collect();
            for field in fields {
                let qualified = join(prefix, &field);
                if fully_kept(&qualified, kept) {
                    continue;
                }
                if partially_kept(&qualified, kept) {
                    if let Some(child) = map.get_mut(&field) {
                        retain_paths(child, &qualified, kept);
                    }
                } else {
                    map.remove(&field);
                }
            }
        }
        // selections ignore indexes: every element is projected alike
        Value::Array(items) => {
            for item in items.iter_mut() {
                retain_paths(item, prefix, kept);
            }
        }
        _ => {}
    }
}

fn fully_kept(qualified: &str, kept: &BTreeSet<String>) -> bool {
    kept.iter()
        .any(|k| k == qualified || is_strictly_below(qualified, k))
}

fn partially_kept(qualified: &str, kept: &BTreeSet<String>) -> bool {
    kept.iter().any(|k| is_strictly_below(k, qualified))
}

fn is_strictly_below(name: &str, ancestor: &str) -> bool {
    name.len() > ancestor.len()
        && name.starts_with(ancestor)
        && name.as_bytes()[ancestor.len()] == b'.'
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaOptions, SchemaPath, SchemaType};
    use serde_json::json;

    fn event_log() -> Schema {
        let element = Schema::with_options(SchemaOptions {
            discriminator_key: Some("kind".to_string()),
            ..Default::default()
        })
        .path("message", SchemaPath::required(SchemaType::String));
        let clicked = Schema::new().path("element", SchemaPath::new(SchemaType::String));
        let mut schema = Schema::new()
            .path("name", SchemaPath::new(SchemaType::String))
            .path("secret", SchemaPath::new(SchemaType::String))
            .path(
                "events",
                SchemaPath::new(SchemaType::array_of(SchemaType::document(element))),
            );
        schema
            .discriminator_at("events", "Clicked", &clicked)
            .unwrap();
        schema
    }

    #[test]
    fn dispatch_paths_cover_every_level() {
        let schema = event_log();
        let paths = dispatch_paths(&schema);
        assert!(paths.contains("__t"));
        assert!(paths.contains("events.kind"));

        let protected = always_included(&schema);
        assert!(protected.contains("_id"));
    }

    #[test]
    fn include_keeps_selected_and_protected_paths() {
        let schema = event_log();
        let mut data = json!({
            "_id": "d1",
            "name": "session",
            "secret": "hush",
            "events": [
                {"kind": "Clicked", "message": "m", "element": "#buy"}
            ]
        });
        let selection = FieldSelection::include(["events.message"]);
        project(&selection, &schema, &mut data);

        assert_eq!(data.get("_id"), Some(&json!("d1")));
        assert_eq!(data.get("name"), None);
        assert_eq!(data.get("secret"), None);
        let element = &data["events"][0];
        assert_eq!(element.get("message"), Some(&json!("m")));
        assert_eq!(element.get("kind"), Some(&json!("Clicked")));
        assert_eq!(element.get("element"), None);
    }

    #[test]
    fn include_of_a_whole_subtree_keeps_it_intact() {
        let schema = event_log();
        let mut data = json!({
            "name": "session",
            "events": [{"kind": "Clicked", "message": "m", "element": "#buy"}]
        });
        project(&FieldSelection::include(["events"]), &schema, &mut data);
        assert_eq!(data["events"][0].get("element"), Some(&json!("#buy")));
        assert_eq!(data.get("name"), None);
    }

    #[test]
    fn irrelevant_protected_paths_are_not_resurrected() {
        let schema = event_log();
        let mut data = json!({
            "name": "session",
            "events": [{"kind": "Clicked", "message": "m"}]
        });
        project(&FieldSelection::include(["name"]), &schema, &mut data);
        assert_eq!(data.get("name"), Some(&json!("session")));
        assert_eq!(data.get("events"), None);
    }

    #[test]
    fn exclusions_that_would_strip_dispatch_data_are_ignored() {
        let schema = event_log();
        let mut data = json!({
            "_id": "d1",
            "secret": "hush",
            "events": [{"kind": "Clicked", "message": "m"}]
        });
        project(
            &FieldSelection::exclude(["secret", "events", "_id"]),
            &schema,
            &mut data,
        );
        assert_eq!(data.get("secret"), None);
        // both carry protected paths and survive untouched
        assert!(data.get("events").is_some());
        assert_eq!(data.get("_id"), Some(&json!("d1")));
    }

    #[test]
    fn exclusion_distributes_through_array_elements() {
        let schema = event_log();
        let mut data = json!({
            "events": [
                {"kind": "Clicked", "message": "a"},
                {"message": "b"}
            ]
        });
        project(&FieldSelection::exclude(["events.message"]), &schema, &mut data);
        assert_eq!(data["events"][0].get("message"), None);
        assert_eq!(data["events"][1].get("message"), None);
        assert_eq!(data["events"][0].get("kind"), Some(&json!("Clicked")));
    }

    #[test]
    fn selections_round_trip_through_serde() {
        let selection = FieldSelection::include(["a", "b.c"]);
        let encoded = serde_json::to_value(&selection).unwrap();
        assert_eq!(encoded, json!({"include": ["a", "b.c"]}));
        let decoded: FieldSelection = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, selection);
    }
}
