//! The instance tree: elements (leaves) and fieldsets (groups of named fields).

use serde_json::{Map, Value};

use crate::named_map::{Handle, InsertError, NamedMap};

/// Attribute under which an element holds its value.
pub const VALUE_ATTRIBUTE: &str = "value";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FieldKind {
    Leaf,
    Group,
}

/// A single named field carrying a flat attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: Map<String, Value>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn value(&self) -> Option<&Value> {
        self.attribute(VALUE_ATTRIBUTE)
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.set_attribute(VALUE_ATTRIBUTE, value);
    }
}

/// An ordered group of uniquely named fields.
///
/// Children are keyed by the name they had when added; renaming a child
/// through `get_mut` does not re-key it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fieldset {
    name: String,
    children: NamedMap<Field>,
}

impl Fieldset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: NamedMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Append a child. Fails if a child with the same name is already present.
    pub fn add(&mut self, field: impl Into<Field>) -> Result<Handle, InsertError> {
        let field = field.into();
        self.children.insert(field.name().to_owned(), field)
    }

    pub fn has(&self, name: &str) -> bool {
        self.children.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.children.get_mut(name)
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.get(name).and_then(Field::as_element)
    }

    pub fn element_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.get_mut(name).and_then(Field::as_element_mut)
    }

    pub fn fieldset(&self, name: &str) -> Option<&Fieldset> {
        self.get(name).and_then(Field::as_fieldset)
    }

    pub fn fieldset_mut(&mut self, name: &str) -> Option<&mut Fieldset> {
        self.get_mut(name).and_then(Field::as_fieldset_mut)
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.children.remove(name).map(|(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Children in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.children.values()
    }

    pub(crate) fn children(&self) -> &NamedMap<Field> {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut NamedMap<Field> {
        &mut self.children
    }

    /// Fill children from `data`. Keys without a matching child are ignored.
    pub fn populate_values(&mut self, data: &Map<String, Value>) {
        for (key, value) in data {
            match self.children.get_mut(key) {
                Some(child) => child.populate(value),
                None => tracing::trace!(fieldset = %self.name, key = %key, "no child for key"),
            }
        }
    }

    /// Current values of all children, keyed by child name.
    pub fn values(&self) -> Map<String, Value> {
        self.children
            .iter()
            .map(|(_, name, field)| (name.to_owned(), field.to_value()))
            .collect()
    }
}

/// A node of the instance tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Leaf(Element),
    Group(Fieldset),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Leaf(e) => e.name(),
            Field::Group(g) => g.name(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            Field::Leaf(e) => e.set_name(name),
            Field::Group(g) => g.set_name(name),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Leaf(_) => FieldKind::Leaf,
            Field::Group(_) => FieldKind::Group,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Field::Leaf(e) => Some(e),
            Field::Group(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Field::Leaf(e) => Some(e),
            Field::Group(_) => None,
        }
    }

    pub fn as_fieldset(&self) -> Option<&Fieldset> {
        match self {
            Field::Group(g) => Some(g),
            Field::Leaf(_) => None,
        }
    }

    pub fn as_fieldset_mut(&mut self) -> Option<&mut Fieldset> {
        match self {
            Field::Group(g) => Some(g),
            Field::Leaf(_) => None,
        }
    }

    /// Assign `value` to a leaf, or reconcile a group with it when it is an
    /// object. A group handed a non-object value is left untouched.
    pub fn populate(&mut self, value: &Value) {
        match self {
            Field::Leaf(e) => e.set_value(value.clone()),
            Field::Group(g) => match value.as_object() {
                Some(data) => g.populate_values(data),
                None => tracing::debug!(fieldset = %g.name(), "ignoring non-object value for fieldset"),
            },
        }
    }

    /// Leaf value (or `null` when unset); groups become objects.
    pub fn to_value(&self) -> Value {
        match self {
            Field::Leaf(e) => e.value().cloned().unwrap_or(Value::Null),
            Field::Group(g) => Value::Object(g.values()),
        }
    }
}

impl From<Element> for Field {
    fn from(e: Element) -> Self {
        Field::Leaf(e)
    }
}

impl From<Fieldset> for Field {
    fn from(g: Fieldset) -> Self {
        Field::Group(g)
    }
}
