//! Path descriptors and the ordered path registry.
//!
//! Paths are dotted names (`run.tab`, `events`) mapping to a
//! [`SchemaPath`] descriptor. The registry preserves declaration order
//! and resolves dotted lookups through embedded documents and array
//! nesting.

use indexmap::IndexMap;

use crate::discriminator::DiscriminatorRegistry;

use super::types::{DefaultValue, SchemaType, Validator};

/// Descriptor for a single declared path.
#[derive(Debug, Clone)]
pub struct SchemaPath {
    pub(crate) ty: SchemaType,
    pub(crate) required: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) validators: Vec<Validator>,
    /// Present once the first discriminator is registered against this
    /// path. Always attached to the innermost document type.
    pub(crate) discriminators: Option<DiscriminatorRegistry>,
}

impl SchemaPath {
    /// Optional path of the given type.
    pub fn new(ty: SchemaType) -> Self {
        SchemaPath {
            ty,
            required: false,
            default: None,
            validators: Vec::new(),
            discriminators: None,
        }
    }

    /// Required path of the given type.
    pub fn required(ty: SchemaType) -> Self {
        SchemaPath {
            required: true,
            ..SchemaPath::new(ty)
        }
    }

    pub fn with_default(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn ty(&self) -> &SchemaType {
        &self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn discriminators(&self) -> Option<&DiscriminatorRegistry> {
        self.discriminators.as_ref()
    }

    /// Resolves the remainder of a dotted lookup that landed on this
    /// path. Numeric segments step through array nesting; embedded
    /// documents hand off to their own registry; a mixed type swallows
    /// anything below it.
    fn resolve_rest(&self, rest: &str) -> Option<&SchemaPath> {
        let mut ty = &self.ty;
        let mut segments: Vec<&str> = rest.split('.').collect();
        while let Some(first) = segments.first() {
            match ty {
                SchemaType::Array(element) if is_index_segment(first) => {
                    ty = element;
                    segments.remove(0);
                }
                _ => break,
            }
        }
        if segments.is_empty() {
            return Some(self);
        }
        match ty {
            SchemaType::Mixed => Some(self),
            SchemaType::Embedded(schema) => schema.paths().resolve(&segments.join(".")),
            _ => None,
        }
    }
}

pub(crate) fn is_index_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// True when `name` sits strictly below `candidate` in dotted space.
fn is_below(name: &str, candidate: &str) -> bool {
    name.len() > candidate.len()
        && name.starts_with(candidate)
        && name.as_bytes()[candidate.len()] == b'.'
}

/// Ordered registry of declared paths.
#[derive(Debug, Clone, Default)]
pub struct PathMap {
    paths: IndexMap<String, SchemaPath>,
}

impl PathMap {
    pub fn new() -> Self {
        PathMap::default()
    }

    /// Declares a path. The new declaration wins over anything it
    /// conflicts with: descriptors strictly below it are dropped, and
    /// so is any ancestor descriptor it now shadows. Declaring a path
    /// whose type is not a document container over a structured
    /// subtree therefore removes that subtree entirely.
    pub fn insert(&mut self, name: impl Into<String>, path: SchemaPath) {
        let name = name.into();
        self.paths
            .retain(|existing, _| !is_below(existing, &name) && !is_below(&name, existing));
        self.paths.insert(name, path);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaPath> {
        self.paths.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut SchemaPath> {
        self.paths.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaPath)> {
        self.paths.iter().map(|(name, path)| (name.as_str(), path))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Declared paths flagged required, in declaration order.
    pub fn required_paths(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, path)| path.required)
            .map(|(name, _)| name)
            .collect()
    }

    /// Resolves a dotted lookup, descending through embedded documents
    /// and past numeric array segments. Lookups below a mixed path
    /// resolve to the mixed descriptor itself.
    pub fn resolve(&self, dotted: &str) -> Option<&SchemaPath> {
        if let Some(direct) = self.paths.get(dotted) {
            return Some(direct);
        }
        let mut best: Option<(&String, &SchemaPath)> = None;
        for (name, path) in &self.paths {
            if is_below(dotted, name)
                && best.map(|(b, _)| name.len() > b.len()).unwrap_or(true)
            {
                best = Some((name, path));
            }
        }
        let (name, path) = best?;
        path.resolve_rest(&dotted[name.len() + 1..])
    }

    /// Whether a top-level field name is accounted for by some
    /// declaration, either directly or as a dotted group.
    pub(crate) fn covers_segment(&self, segment: &str) -> bool {
        self.paths.keys().any(|name| {
            name == segment
                || (name.starts_with(segment) && name.as_bytes().get(segment.len()) == Some(&b'.'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn structured_run() -> PathMap {
        let mut map = PathMap::new();
        map.insert("run.tab", SchemaPath::new(SchemaType::String));
        map.insert("run.flag", SchemaPath::new(SchemaType::Bool));
        map
    }

    #[test]
    fn disjoint_dotted_paths_coexist() {
        let map = structured_run();
        assert_eq!(map.len(), 2);
        assert!(map.contains("run.tab"));
        assert!(map.contains("run.flag"));
    }

    #[test]
    fn redeclaring_a_parent_drops_the_subtree() {
        let mut map = structured_run();
        map.insert("run", SchemaPath::new(SchemaType::Mixed));
        assert_eq!(map.len(), 1);
        assert!(map.contains("run"));
        assert!(!map.contains("run.tab"));
        // Lookups below the mixed path resolve to the mixed descriptor.
        let resolved = map.resolve("run.tab.anything").unwrap();
        assert_eq!(resolved.ty().type_name(), "mixed");
    }

    #[test]
    fn declaring_below_a_scalar_replaces_the_scalar() {
        let mut map = PathMap::new();
        map.insert("run", SchemaPath::new(SchemaType::String));
        map.insert("run.tab", SchemaPath::new(SchemaType::Int));
        assert!(!map.contains("run"));
        assert!(map.contains("run.tab"));
    }

    #[test]
    fn resolve_descends_embedded_documents_and_arrays() {
        let mut inner = Schema::new();
        inner.add_path("product", SchemaPath::required(SchemaType::String));
        let mut map = PathMap::new();
        map.insert(
            "events",
            SchemaPath::new(SchemaType::array_of(SchemaType::document(inner))),
        );

        let direct = map.resolve("events").unwrap();
        assert_eq!(direct.ty().type_name(), "array");

        let element = map.resolve("events.0").unwrap();
        assert_eq!(element.ty().type_name(), "array");

        let field = map.resolve("events.0.product").unwrap();
        assert_eq!(field.ty().type_name(), "string");
        assert!(field.is_required());

        assert!(map.resolve("events.0.missing").is_none());
        assert!(map.resolve("absent").is_none());
    }

    #[test]
    fn covers_segment_sees_dotted_groups() {
        let map = structured_run();
        assert!(map.covers_segment("run"));
        assert!(!map.covers_segment("ru"));
        assert!(!map.covers_segment("other"));
    }
}
