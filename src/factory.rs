//! Building fields from declarative specifications.
//!
//! ```json
//! {
//!   "type": "fieldset",
//!   "name": "address",
//!   "elements": [
//!     { "name": "street" },
//!     { "type": "number", "name": "zip", "attributes": { "min": 0 } }
//!   ]
//! }
//! ```
//!
//! `type` defaults to a plain element. Any type other than `fieldset` builds
//! an element and is kept as its `type` attribute.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::FactoryError;
use crate::field::{Element, Field, Fieldset};
use crate::named_map::InsertError;

const FIELDSET_TYPE: &str = "fieldset";
const ELEMENT_TYPE: &str = "element";

/// Turns a raw specification into a field instance.
pub trait Factory {
    fn create(&self, spec: &Value) -> Result<Field, FactoryError>;
}

/// Default factory reading the JSON layout shown in the module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecFactory;

#[derive(Debug, Deserialize)]
struct FieldSpec {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    elements: Vec<FieldSpec>,
}

impl Factory for SpecFactory {
    fn create(&self, spec: &Value) -> Result<Field, FactoryError> {
        let spec = FieldSpec::deserialize(spec)?;
        build(spec)
    }
}

fn build(spec: FieldSpec) -> Result<Field, FactoryError> {
    match spec.kind.as_deref() {
        Some(FIELDSET_TYPE) => {
            let mut group = Fieldset::new(spec.name);
            for child in spec.elements {
                if child.name.is_empty() {
                    return Err(FactoryError::UnnamedChild {
                        parent: group.name().to_owned(),
                    });
                }
                let field = build(child)?;
                group
                    .add(field)
                    .map_err(|InsertError::DuplicateName(name)| FactoryError::DuplicateChild {
                        parent: group.name().to_owned(),
                        name,
                    })?;
            }
            Ok(Field::Group(group))
        }
        kind => {
            if !spec.elements.is_empty() {
                return Err(FactoryError::ChildrenOnElement { name: spec.name });
            }
            let mut element = Element::new(spec.name);
            for (key, value) in spec.attributes {
                element.set_attribute(key, value);
            }
            if let Some(kind) = kind.filter(|k| *k != ELEMENT_TYPE) {
                element.set_attribute("type", kind);
            }
            Ok(Field::Leaf(element))
        }
    }
}
