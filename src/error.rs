use thiserror::Error;

use crate::named_map::InsertError;

/// Failures raised while turning a raw specification into a field.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("malformed field specification: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("fieldset `{parent}` has a child without a name")]
    UnnamedChild { parent: String },

    #[error("fieldset `{parent}` declares `{name}` more than once")]
    DuplicateChild { parent: String, name: String },

    #[error("element `{name}` cannot declare child elements")]
    ChildrenOnElement { name: String },
}

#[derive(Debug, Error)]
pub enum CollectionError {
    /// The target element did not resolve to a field or fieldset. The
    /// previously installed prototype, if any, is kept.
    #[error("invalid target element: {0}")]
    InvalidPrototype(#[source] FactoryError),

    #[error("no instance named `{key}` in the collection")]
    KeyNotFound { key: String },

    #[error("instance `{key}` is a fieldset and needs an object of values")]
    ExpectedObject { key: String },

    #[error("the collection has no target element to clone")]
    MissingPrototype,

    #[error(transparent)]
    Insert(#[from] InsertError),

    #[error("invalid collection options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
}
