//! Error types for discriminator registration and dispatch.

use thiserror::Error;

/// Errors raised while registering a discriminator child or resolving
/// a stored discriminator value.
#[derive(Debug, Clone, Error)]
pub enum DiscriminatorError {
    // ============================================================
    // Registration errors
    // ============================================================
    /// The value offered as the child schema was not usable.
    #[error("discriminator `{name}`: you must pass a valid discriminator schema ({detail})")]
    InvalidSchema { name: String, detail: String },

    /// The owner (or the offered child schema) is already a derived
    /// child; hierarchies are single-level.
    #[error("discriminator `{name}` can only be a discriminator of the root model")]
    NotRoot { name: String },

    /// The child schema declares a path that collides with the key
    /// field the hierarchy dispatches on.
    #[error("discriminator `{name}` declares the reserved key path `{key}`")]
    KeyCollision { name: String, key: String },

    /// A sibling with the same name is already registered.
    #[error("discriminator `{name}` is already registered on `{owner}`")]
    DuplicateName { name: String, owner: String },

    /// A sibling is already tied to the same stored value.
    #[error("discriminator value `{value}` is already tied to `{existing}` on `{owner}`")]
    DuplicateValue {
        value: String,
        existing: String,
        owner: String,
    },

    /// The child tried to change an option only the root controls.
    #[error("discriminator `{name}` can't customize option `{option}`")]
    NonCustomizableOption { name: String, option: &'static str },

    /// Discriminators attach to document-shaped paths only.
    #[error("path `{path}` does not support discriminators: {reason}")]
    UnsupportedPath { path: String, reason: String },

    // ============================================================
    // Dispatch errors
    // ============================================================
    /// No child is tied to the stored key value.
    #[error("Discriminator \"{value}\" not found for model \"{model}\"")]
    NotFound { value: String, model: String },

    /// The stored key field is write-protected once a document has
    /// been dispatched.
    #[error("Can't set discriminator key \"{key}\"")]
    KeyProtected { key: String },
}

impl DiscriminatorError {
    /// Stable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            DiscriminatorError::InvalidSchema { .. } => "invalid_schema",
            DiscriminatorError::NotRoot { .. } => "not_root",
            DiscriminatorError::KeyCollision { .. } => "key_collision",
            DiscriminatorError::DuplicateName { .. } => "duplicate_name",
            DiscriminatorError::DuplicateValue { .. } => "duplicate_value",
            DiscriminatorError::NonCustomizableOption { .. } => "non_customizable_option",
            DiscriminatorError::UnsupportedPath { .. } => "unsupported_path",
            DiscriminatorError::NotFound { .. } => "not_found",
            DiscriminatorError::KeyProtected { .. } => "key_protected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_value_and_model() {
        let err = DiscriminatorError::NotFound {
            value: "Tapped".to_string(),
            model: "Event".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Discriminator \"Tapped\" not found for model \"Event\""
        );
    }

    #[test]
    fn key_protected_message_is_stable() {
        let err = DiscriminatorError::KeyProtected {
            key: "kind".to_string(),
        };
        assert!(err.to_string().starts_with("Can't set discriminator key"));
    }

    #[test]
    fn hierarchy_message_names_the_root_constraint() {
        let err = DiscriminatorError::NotRoot {
            name: "Clicked".to_string(),
        };
        assert!(err
            .to_string()
            .contains("can only be a discriminator of the root model"));
        assert_eq!(err.code(), "not_root");
    }
}
