//! Prototype cloning.
//!
//! Every collection entry is produced from one prototype field. A group
//! prototype is rebuilt child by child into fresh ordered storage, recursing
//! through every level, so an instance never shares mutable state with the
//! prototype or with its siblings.

use crate::field::{Field, FieldKind, Fieldset};

/// The single field or fieldset every collection entry is cloned from.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    field: Field,
}

impl Prototype {
    pub fn new(field: impl Into<Field>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn kind(&self) -> FieldKind {
        self.field.kind()
    }

    /// Produce an independent instance named `name`.
    pub fn instantiate(&self, name: impl Into<String>) -> Field {
        let mut instance = deep_clone(&self.field);
        instance.set_name(name);
        tracing::trace!(instance = %instance.name(), kind = ?instance.kind(), "instantiated prototype");
        instance
    }
}

impl From<Field> for Prototype {
    fn from(field: Field) -> Self {
        Prototype::new(field)
    }
}

fn deep_clone(field: &Field) -> Field {
    match field {
        Field::Leaf(e) => Field::Leaf(e.clone()),
        Field::Group(g) => Field::Group(clone_fieldset(g)),
    }
}

// Rebuild ordering and index from empty rather than copying storage, so the
// clone is compact and carries no removed-slot history from the source.
fn clone_fieldset(source: &Fieldset) -> Fieldset {
    let mut copy = Fieldset::new(source.name());
    let children = copy.children_mut();
    for (_, name, child) in source.children().iter() {
        // Names are unique in `source`, so re-inserting them cannot collide.
        if children.insert(name, deep_clone(child)).is_err() {
            debug_assert!(false, "duplicate child `{name}` while cloning");
        }
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Element;
    use serde_json::json;

    fn person() -> Fieldset {
        let mut g = Fieldset::new("person");
        g.add(Element::new("name").with_attribute("value", "proto"))
            .unwrap();
        let mut address = Fieldset::new("address");
        address.add(Element::new("city")).unwrap();
        g.add(address).unwrap();
        g
    }

    #[test]
    fn leaf_instance_is_renamed_copy() {
        let proto = Prototype::new(Element::new("email").with_attribute("type", "email"));
        let a = proto.instantiate("0");
        assert_eq!(a.name(), "0");
        assert_eq!(
            a.as_element().unwrap().attribute("type"),
            Some(&json!("email"))
        );
        assert_eq!(proto.field().name(), "email");
    }

    #[test]
    fn mutating_first_level_child_does_not_leak() {
        let proto = Prototype::new(person());
        let mut a = proto.instantiate("0");
        let b = proto.instantiate("1");

        a.as_fieldset_mut()
            .unwrap()
            .element_mut("name")
            .unwrap()
            .set_value("changed");

        let read = |f: &Field| {
            f.as_fieldset()
                .unwrap()
                .element("name")
                .unwrap()
                .value()
                .cloned()
        };
        assert_eq!(read(&a), Some(json!("changed")));
        assert_eq!(read(&b), Some(json!("proto")));
        assert_eq!(read(proto.field()), Some(json!("proto")));
    }

    #[test]
    fn mutating_grandchild_does_not_leak() {
        let proto = Prototype::new(person());
        let mut a = proto.instantiate("0");
        let b = proto.instantiate("1");

        let address = a
            .as_fieldset_mut()
            .unwrap()
            .fieldset_mut("address")
            .unwrap();
        address.element_mut("city").unwrap().set_value("Oslo");
        address.add(Element::new("zip")).unwrap();

        let address_b = b.as_fieldset().unwrap().fieldset("address").unwrap();
        assert_eq!(address_b.element("city").unwrap().value(), None);
        assert!(!address_b.has("zip"));
        let address_p = proto.field().as_fieldset().unwrap().fieldset("address").unwrap();
        assert_eq!(address_p.len(), 1);
    }

    #[test]
    fn instance_keeps_child_order() {
        let proto = Prototype::new(person());
        let a = proto.instantiate("7");
        let names: Vec<&str> = a.as_fieldset().unwrap().iter().map(Field::name).collect();
        assert_eq!(names, vec!["name", "address"]);
        assert_eq!(a.kind(), FieldKind::Group);
    }

    #[test]
    fn instance_ignores_removed_children_of_prototype() {
        let mut g = person();
        g.add(Element::new("tmp")).unwrap();
        g.remove("tmp");
        g.add(Element::new("age")).unwrap();
        let proto = Prototype::new(g);

        let a = proto.instantiate("0");
        let names: Vec<&str> = a.as_fieldset().unwrap().iter().map(Field::name).collect();
        assert_eq!(names, vec!["name", "address", "age"]);
    }
}
