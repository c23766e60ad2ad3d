//! Typed collection configuration.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::CollectionError;
use crate::field::{Element, Field, Fieldset};

/// What a collection clones its entries from: a ready instance, or a raw
/// specification for the collection's factory to build.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetElement {
    Instance(Field),
    Spec(Value),
}

impl From<Field> for TargetElement {
    fn from(field: Field) -> Self {
        TargetElement::Instance(field)
    }
}

impl From<Element> for TargetElement {
    fn from(e: Element) -> Self {
        TargetElement::Instance(Field::Leaf(e))
    }
}

impl From<Fieldset> for TargetElement {
    fn from(g: Fieldset) -> Self {
        TargetElement::Instance(Field::Group(g))
    }
}

impl From<Value> for TargetElement {
    fn from(spec: Value) -> Self {
        TargetElement::Spec(spec)
    }
}

// Configuration maps only ever carry raw data.
impl<'de> Deserialize<'de> for TargetElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(TargetElement::Spec)
    }
}

/// Recognized collection options. Keys not listed here are ignored.
///
/// `count` accepts any integer; negative values clamp to zero when applied.
/// A `template_placeholder` that is not a string is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
    pub target_element: Option<TargetElement>,
    pub count: Option<i64>,
    pub allow_add: Option<bool>,
    pub should_create_template: Option<bool>,
    #[serde(deserialize_with = "text_or_none")]
    pub template_placeholder: Option<String>,
}

fn text_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

impl CollectionOptions {
    pub fn from_value(value: Value) -> Result<Self, CollectionError> {
        serde_json::from_value(value).map_err(CollectionError::InvalidOptions)
    }

    pub fn target_element(mut self, target: impl Into<TargetElement>) -> Self {
        self.target_element = Some(target.into());
        self
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn allow_add(mut self, allow: bool) -> Self {
        self.allow_add = Some(allow);
        self
    }

    pub fn should_create_template(mut self, create: bool) -> Self {
        self.should_create_template = Some(create);
        self
    }

    pub fn template_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.template_placeholder = Some(placeholder.into());
        self
    }
}
