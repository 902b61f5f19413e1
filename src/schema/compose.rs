//! Schema composition.
//!
//! `compose(base, addition)` produces a new schema in which everything
//! the addition declares wins, and everything it does not declare is
//! carried over from the base untouched. Multi-level hierarchies apply
//! this pairwise, so the nearest ancestor's declaration is the one a
//! descendant inherits.

use super::schema::Schema;

/// Merges `addition` over `base`.
///
/// - Paths: the addition's descriptor wins at its location; conflicting
///   subtrees are replaced outright, which is also what shadows a
///   structured subtree when the addition re-declares its root as
///   mixed.
/// - Hooks: the addition's chains append after the base's, minus any
///   registration already present in the base.
/// - Methods, statics, virtuals: name-keyed override.
/// - Indexes: concatenated, exact duplicates collapsed.
/// - Options: base values overlaid with the addition's explicitly-set
///   values.
pub fn compose(base: &Schema, addition: &Schema) -> Schema {
    merge(base, addition, false)
}

/// Composition variant used when deriving a discriminator child.
/// Identical to [`compose`] except that serialization-view options are
/// never copied down from the base, and the result carries no
/// discriminator mapping; registration installs the child's own.
pub(crate) fn compose_for_discriminator(base: &Schema, addition: &Schema) -> Schema {
    merge(base, addition, true)
}

fn merge(base: &Schema, addition: &Schema, for_discriminator: bool) -> Schema {
    let mut merged = base.clone();

    for (name, path) in addition.paths.iter() {
        merged.paths.insert(name, path.clone());
    }

    merged.hooks.append_dedup(&addition.hooks);

    for (name, body) in &addition.methods {
        merged.methods.insert(name.clone(), body.clone());
    }
    for (name, body) in &addition.statics {
        merged.statics.insert(name.clone(), body.clone());
    }
    for (name, virtual_def) in &addition.virtuals {
        merged.virtuals.insert(name.clone(), virtual_def.clone());
    }

    for spec in &addition.indexes {
        if !merged.indexes.contains(spec) {
            merged.indexes.push(spec.clone());
        }
    }

    if for_discriminator {
        merged.options = base.options.overlay_for_discriminator(&addition.options);
        merged.discriminator = None;
    } else {
        merged.options = base.options.overlay(&addition.options);
        merged.discriminator = base.discriminator.clone();
    }

    merged
}
