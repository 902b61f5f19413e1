//! Dotted-path access over raw JSON values.
//!
//! Segments traverse object fields; numeric segments index into
//! arrays. These helpers are the single traversal used by documents,
//! validation, and projection.

use serde_json::{Map, Value};

use crate::schema::is_index_segment;

/// Reads the value at a dotted path.
pub(crate) fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) if is_index_segment(segment) => {
                items.get(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable twin of [`value_at`]. Never creates anything.
pub(crate) fn value_at_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) if is_index_segment(segment) => {
                items.get_mut(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Walks to a dotted path, creating intermediate objects along the
/// way. Array segments must already exist: indexes are never invented.
/// Returns `None` when a scalar sits in the middle of the path or an
/// index is out of range.
pub(crate) fn ensure_path_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.split('.') {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Array(items) if is_index_segment(segment) => {
                items.get_mut(segment.parse::<usize>().ok()?)?
            }
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => return None,
        };
    }
    Some(current)
}

/// Removes the value at a dotted path. Paths crossing an array apply
/// to every element, so hiding `events.secret` strips the field from
/// each event.
pub(crate) fn remove_at(root: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    remove_segments(root, &segments);
}

fn remove_segments(value: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match value {
        Value::Object(map) => {
            if rest.is_empty() {
                map.remove(*head);
            } else if let Some(next) = map.get_mut(*head) {
                remove_segments(next, rest);
            }
        }
        Value::Array(items) => {
            if is_index_segment(head) {
                if let Ok(index) = head.parse::<usize>() {
                    if rest.is_empty() {
                        if index < items.len() {
                            items.remove(index);
                        }
                    } else if let Some(item) = items.get_mut(index) {
                        remove_segments(item, rest);
                    }
                }
            } else {
                for item in items.iter_mut() {
                    remove_segments(item, segments);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_at_traverses_objects_and_arrays() {
        let doc = json!({"events": [{"kind": "Clicked"}, {"kind": "Purchased"}]});
        assert_eq!(value_at(&doc, "events.1.kind"), Some(&json!("Purchased")));
        assert_eq!(value_at(&doc, "events.2.kind"), None);
        assert_eq!(value_at(&doc, "events.kind"), None);
    }

    #[test]
    fn ensure_path_creates_objects_but_not_indexes() {
        let mut doc = json!({});
        *ensure_path_mut(&mut doc, "run.tab").unwrap() = json!("home");
        assert_eq!(doc, json!({"run": {"tab": "home"}}));

        assert!(ensure_path_mut(&mut doc, "run.tab.deeper").is_none());
        assert!(ensure_path_mut(&mut doc, "items.0").is_none());
    }

    #[test]
    fn remove_at_distributes_across_array_elements() {
        let mut doc = json!({"events": [
            {"kind": "Clicked", "secret": 1},
            {"kind": "Purchased", "secret": 2}
        ]});
        remove_at(&mut doc, "events.secret");
        assert_eq!(
            doc,
            json!({"events": [{"kind": "Clicked"}, {"kind": "Purchased"}]})
        );
        remove_at(&mut doc, "events.0");
        assert_eq!(doc, json!({"events": [{"kind": "Purchased"}]}));
    }
}
