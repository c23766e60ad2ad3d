//! Collection: a variable-size set of fields cloned from one prototype.

use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

use crate::error::CollectionError;
use crate::factory::{Factory, SpecFactory};
use crate::field::{Element, Field, FieldKind, Fieldset};
use crate::input_filter::{InputFilterProvider, InputFilterSpec, InputSpec};
use crate::named_map::{Handle, NamedMap};
use crate::options::{CollectionOptions, TargetElement};
use crate::prototype::Prototype;

/// Name of the template instance unless configured otherwise.
pub const DEFAULT_TEMPLATE_PLACEHOLDER: &str = "__index__";

const DEFAULT_COUNT: usize = 1;

/// Ordered, name-addressable instances of a prototype field.
///
/// Instances `0..count` are created by [`Collection::prepare`]; further
/// instances appear when [`Collection::populate_values`] receives more
/// entries than `count` and growth is allowed. An optional template
/// instance lives under the placeholder name and is never counted.
pub struct Collection {
    name: String,
    prototype: Option<Prototype>,
    count: usize,
    allow_add: bool,
    should_create_template: bool,
    template_placeholder: String,
    instances: NamedMap<Field>,
    factory: Rc<dyn Factory>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_factory(name, Rc::new(SpecFactory))
    }

    pub fn with_factory(name: impl Into<String>, factory: Rc<dyn Factory>) -> Self {
        Self {
            name: name.into(),
            prototype: None,
            count: DEFAULT_COUNT,
            allow_add: true,
            should_create_template: false,
            template_placeholder: DEFAULT_TEMPLATE_PLACEHOLDER.to_owned(),
            instances: NamedMap::new(),
            factory,
        }
    }

    /// Build a collection from `options` and prepare it.
    pub fn with_options(
        name: impl Into<String>,
        options: CollectionOptions,
    ) -> Result<Self, CollectionError> {
        let mut collection = Self::new(name);
        collection.set_options(options)?;
        Ok(collection)
    }

    /// Apply `options`, then prepare.
    ///
    /// The template flag is only recorded here; `prepare` adds the template
    /// after instances `0..count`, under the configured placeholder. A
    /// failing target element aborts before any other option is applied.
    pub fn set_options(&mut self, options: CollectionOptions) -> Result<(), CollectionError> {
        let CollectionOptions {
            target_element,
            count,
            allow_add,
            should_create_template,
            template_placeholder,
        } = options;

        if let Some(target) = target_element {
            self.set_target_element(target)?;
        }
        if let Some(count) = count {
            self.set_count(count);
        }
        if let Some(allow_add) = allow_add {
            self.set_allow_add(allow_add);
        }
        if let Some(placeholder) = template_placeholder {
            self.set_template_placeholder(placeholder);
        }
        if let Some(create) = should_create_template {
            self.should_create_template = create;
        }
        self.prepare()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_factory(&mut self, factory: Rc<dyn Factory>) {
        self.factory = factory;
    }

    /// Install the prototype. Specs are built by the collection's factory;
    /// on failure the current prototype is kept. Existing instances are
    /// never altered.
    pub fn set_target_element(
        &mut self,
        target: impl Into<TargetElement>,
    ) -> Result<(), CollectionError> {
        let field = match target.into() {
            TargetElement::Instance(field) => field,
            TargetElement::Spec(spec) => self
                .factory
                .create(&spec)
                .map_err(CollectionError::InvalidPrototype)?,
        };
        tracing::debug!(collection = %self.name, kind = ?field.kind(), "target element set");
        self.prototype = Some(Prototype::new(field));
        Ok(())
    }

    pub fn target_element(&self) -> Option<&Field> {
        self.prototype.as_ref().map(Prototype::field)
    }

    pub fn prototype(&self) -> Option<&Prototype> {
        self.prototype.as_ref()
    }

    /// Negative counts clamp to zero; counts beyond `usize` saturate.
    ///
    /// No instances are created here. `prepare` creates all `count` of them
    /// eagerly, so the count bounds the memory a prepare call uses.
    pub fn set_count(&mut self, count: i64) {
        self.count = if count < 0 {
            0
        } else {
            usize::try_from(count).unwrap_or(usize::MAX)
        };
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn set_allow_add(&mut self, allow_add: bool) {
        self.allow_add = allow_add;
    }

    pub fn allow_add(&self) -> bool {
        self.allow_add
    }

    /// Enabling creates the template instance right away when a prototype is set.
    pub fn set_should_create_template(&mut self, create: bool) -> Result<(), CollectionError> {
        self.should_create_template = create;
        if create {
            self.add_template_instance()?;
        }
        Ok(())
    }

    pub fn should_create_template(&self) -> bool {
        self.should_create_template
    }

    pub fn set_template_placeholder(&mut self, placeholder: impl Into<String>) {
        self.template_placeholder = placeholder.into();
    }

    pub fn template_placeholder(&self) -> &str {
        &self.template_placeholder
    }

    /// Create instances `0..count` and, if enabled, the template instance.
    /// Names that already exist are left alone, so preparing twice is a no-op.
    /// Without a prototype nothing happens.
    pub fn prepare(&mut self) -> Result<(), CollectionError> {
        let Some(prototype) = &self.prototype else {
            return Ok(());
        };

        let mut created = 0usize;
        for i in 0..self.count {
            let name = i.to_string();
            if !self.instances.contains(&name) {
                let instance = prototype.instantiate(name.as_str());
                self.instances.insert(name, instance)?;
                created += 1;
            }
        }
        tracing::debug!(collection = %self.name, count = self.count, created, "prepared collection");

        if self.should_create_template {
            self.add_template_instance()?;
        }
        Ok(())
    }

    fn add_template_instance(&mut self) -> Result<(), CollectionError> {
        let Some(prototype) = &self.prototype else {
            return Ok(());
        };
        if self.instances.contains(&self.template_placeholder) {
            return Ok(());
        }
        let instance = prototype.instantiate(self.template_placeholder.as_str());
        self.instances
            .insert(self.template_placeholder.clone(), instance)?;
        tracing::debug!(
            collection = %self.name,
            placeholder = %self.template_placeholder,
            "added template instance"
        );
        Ok(())
    }

    /// The template instance, when templates are enabled and it exists.
    pub fn template_element(&self) -> Option<&Field> {
        if !self.should_create_template {
            return None;
        }
        self.instances.get(&self.template_placeholder)
    }

    /// Reconcile instances with `data`.
    ///
    /// The first `count` entries of `data`, in map order, must name existing
    /// instances of the prototype's kind and fill them. Later entries fill a
    /// same-named instance or grow the collection with a fresh clone when
    /// `allow_add` is set; otherwise they are dropped. Fieldset instances must
    /// receive objects. While templates are enabled, an entry named by the
    /// placeholder is dropped and still takes its place in the window.
    ///
    /// Every entry is checked before anything is written, so on error the
    /// collection is unchanged.
    pub fn populate_values(&mut self, data: &Map<String, Value>) -> Result<(), CollectionError> {
        if data.is_empty() {
            return Ok(());
        }
        let Some(prototype) = &self.prototype else {
            return Err(CollectionError::MissingPrototype);
        };
        let kind = prototype.kind();

        let mut fills: Vec<(Handle, &Value)> = Vec::with_capacity(data.len());
        let mut additions: Vec<(&str, &Value)> = Vec::new();
        let mut dropped = 0usize;

        for (position, (key, value)) in data.iter().enumerate() {
            if self.is_template_name(key) {
                tracing::debug!(collection = %self.name, key = %key, "ignoring data for template instance");
                dropped += 1;
            } else if position < self.count {
                let handle = self
                    .instances
                    .find(key)
                    .filter(|h| h.value(&self.instances).map(Field::kind) == Some(kind))
                    .ok_or_else(|| CollectionError::KeyNotFound { key: key.clone() })?;
                check_shape(kind, key, value)?;
                fills.push((handle, value));
            } else if self.allow_add {
                match self.instances.find(key) {
                    Some(handle) => {
                        let existing = handle
                            .value(&self.instances)
                            .map(Field::kind)
                            .unwrap_or(kind);
                        check_shape(existing, key, value)?;
                        fills.push((handle, value));
                    }
                    None => {
                        check_shape(kind, key, value)?;
                        additions.push((key.as_str(), value));
                    }
                }
            } else {
                dropped += 1;
            }
        }

        let filled = fills.len();
        for (handle, value) in fills {
            if let Some(instance) = handle.value_mut(&mut self.instances) {
                instance.populate(value);
            }
        }

        let added = additions.len();
        for (key, value) in additions {
            let mut instance = prototype.instantiate(key);
            instance.populate(value);
            self.instances.insert(key, instance)?;
        }

        tracing::debug!(
            collection = %self.name,
            filled,
            added,
            dropped,
            "populated collection"
        );
        Ok(())
    }

    /// Current values keyed by instance name. The template instance is left out.
    pub fn values(&self) -> Map<String, Value> {
        self.instances
            .iter()
            .filter(|(_, name, _)| !self.is_template_name(name))
            .map(|(_, name, field)| (name.to_owned(), field.to_value()))
            .collect()
    }

    fn is_template_name(&self, name: &str) -> bool {
        self.should_create_template && name == self.template_placeholder
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.instances.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.instances.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.instances.get_mut(name)
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
        self.instances.remove(name).map(|(_, f)| f)
    }

    /// Instance names in insertion order, template included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.names()
    }

    /// Instances in insertion order, template included.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.instances.values()
    }
}

fn check_shape(kind: FieldKind, key: &str, value: &Value) -> Result<(), CollectionError> {
    match kind {
        FieldKind::Group if !value.is_object() => Err(CollectionError::ExpectedObject {
            key: key.to_owned(),
        }),
        _ => Ok(()),
    }
}

impl InputFilterProvider for Collection {
    /// Marks the template instance as optional; all other inputs keep the
    /// consumer's defaults.
    fn input_filter_specification(&self) -> InputFilterSpec {
        let mut spec = InputFilterSpec::new();
        if self.should_create_template {
            spec.insert(
                self.template_placeholder.clone(),
                InputSpec { required: false },
            );
        }
        spec
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("prototype", &self.prototype)
            .field("count", &self.count)
            .field("allow_add", &self.allow_add)
            .field("should_create_template", &self.should_create_template)
            .field("template_placeholder", &self.template_placeholder)
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactoryError;
    use serde_json::json;
    use std::cell::Cell;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    fn item() -> Fieldset {
        let mut g = Fieldset::new("item");
        g.add(Element::new("sku")).unwrap();
        g.add(Element::new("qty").with_attribute("value", 1)).unwrap();
        g
    }

    fn prepared(count: i64, proto: impl Into<TargetElement>) -> Collection {
        Collection::with_options(
            "items",
            CollectionOptions::default().target_element(proto).count(count),
        )
        .unwrap()
    }

    #[test]
    fn defaults_follow_collection_conventions() {
        let c = Collection::new("items");
        assert_eq!(c.count(), 1);
        assert!(c.allow_add());
        assert!(!c.should_create_template());
        assert_eq!(c.template_placeholder(), DEFAULT_TEMPLATE_PLACEHOLDER);
        assert!(c.target_element().is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn negative_count_clamps_to_zero() {
        let mut c = Collection::new("items");
        c.set_count(-4);
        assert_eq!(c.count(), 0);
        c.set_count(3);
        assert_eq!(c.count(), 3);
    }

    #[test]
    fn huge_count_saturates_without_creating_instances() {
        let mut c = Collection::new("items");
        c.set_target_element(Element::new("tag")).unwrap();
        c.set_count(i64::MAX);
        assert_eq!(c.count(), usize::try_from(i64::MAX).unwrap_or(usize::MAX));
        assert!(c.is_empty());
    }

    #[test]
    fn prepare_without_prototype_is_noop() {
        let mut c = Collection::new("items");
        c.set_count(3);
        c.set_should_create_template(true).unwrap();
        c.prepare().unwrap();
        assert!(c.is_empty());
        assert!(c.template_element().is_none());
    }

    #[test]
    fn prepare_twice_keeps_instances() {
        let mut c = prepared(2, item());
        c.fieldset_mut("0")
            .unwrap()
            .element_mut("sku")
            .unwrap()
            .set_value("A-1");
        c.prepare().unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(
            c.fieldset("0").unwrap().element("sku").unwrap().value(),
            Some(&json!("A-1"))
        );
    }

    #[test]
    fn raising_count_then_preparing_adds_missing_names() {
        let mut c = prepared(1, Element::new("tag"));
        c.set_count(3);
        c.prepare().unwrap();
        let names: Vec<&str> = c.names().collect();
        assert_eq!(names, vec!["0", "1", "2"]);
    }

    #[test]
    fn spec_target_is_built_by_factory() {
        let c = Collection::with_options(
            "emails",
            CollectionOptions::from_value(json!({
                "target_element": { "type": "email", "name": "email" },
                "count": 2
            }))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(
            c.element("1").unwrap().attribute("type"),
            Some(&json!("email"))
        );
    }

    #[test]
    fn invalid_spec_keeps_previous_prototype() {
        let mut c = Collection::new("items");
        c.set_target_element(Element::new("tag")).unwrap();
        let err = c.set_target_element(json!("not a spec")).unwrap_err();
        assert!(matches!(
            err,
            CollectionError::InvalidPrototype(FactoryError::Malformed(_))
        ));
        assert_eq!(c.target_element().map(Field::name), Some("tag"));
    }

    #[test]
    fn custom_factory_is_used_for_specs() {
        struct Counting(Cell<usize>);
        impl Factory for Counting {
            fn create(&self, spec: &Value) -> Result<Field, FactoryError> {
                self.0.set(self.0.get() + 1);
                let name = spec.as_str().unwrap_or_default();
                Ok(Field::Leaf(Element::new(name)))
            }
        }

        let factory = Rc::new(Counting(Cell::new(0)));
        let mut c = Collection::with_factory("items", factory.clone());
        c.set_target_element(json!("tag")).unwrap();
        c.set_target_element(Element::new("direct")).unwrap();
        assert_eq!(factory.0.get(), 1);
    }

    #[test]
    fn resetting_prototype_does_not_touch_instances() {
        let mut c = prepared(1, item());
        c.set_target_element(Element::new("tag")).unwrap();
        assert!(c.fieldset("0").is_some());

        c.set_count(2);
        c.prepare().unwrap();
        assert!(c.fieldset("0").is_some());
        assert!(c.element("1").is_some());
    }

    #[test]
    fn populate_fills_groups_recursively() {
        let mut c = prepared(2, item());
        c.populate_values(&object(json!({
            "0": { "sku": "A-1", "qty": 3 },
            "1": { "sku": "B-2" }
        })))
        .unwrap();

        assert_eq!(
            Value::Object(c.values()),
            json!({
                "0": { "sku": "A-1", "qty": 3 },
                "1": { "sku": "B-2", "qty": 1 }
            })
        );
    }

    #[test]
    fn unknown_key_in_window_fails_without_changes() {
        let mut c = prepared(2, Element::new("tag"));
        let err = c
            .populate_values(&object(json!({ "0": "x", "7": "y", "9": "z" })))
            .unwrap_err();
        assert!(matches!(err, CollectionError::KeyNotFound { key } if key == "7"));
        assert_eq!(c.element("0").unwrap().value(), None);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn window_lookup_respects_prototype_kind() {
        let mut c = prepared(1, item());
        c.set_target_element(Element::new("tag")).unwrap();
        let err = c
            .populate_values(&object(json!({ "0": "x" })))
            .unwrap_err();
        assert!(matches!(err, CollectionError::KeyNotFound { .. }));
    }

    #[test]
    fn group_instance_needs_object() {
        let mut c = prepared(1, item());
        let err = c
            .populate_values(&object(json!({ "0": { "sku": "ok" }, "1": 5 })))
            .unwrap_err();
        assert!(matches!(err, CollectionError::ExpectedObject { key } if key == "1"));
        assert_eq!(c.len(), 1);
        assert_eq!(c.fieldset("0").unwrap().element("sku").unwrap().value(), None);
    }

    #[test]
    fn growth_into_existing_name_fills_in_place() {
        let mut c = prepared(1, Element::new("tag"));
        c.populate_values(&object(json!({ "0": "a", "5": "b" })))
            .unwrap();
        c.populate_values(&object(json!({ "0": "c", "5": "d" })))
            .unwrap();
        let names: Vec<&str> = c.names().collect();
        assert_eq!(names, vec!["0", "5"]);
        assert_eq!(c.element("5").unwrap().value(), Some(&json!("d")));
    }

    #[test]
    fn missing_prototype_only_matters_for_non_empty_data() {
        let mut c = Collection::new("items");
        c.populate_values(&Map::new()).unwrap();
        let err = c.populate_values(&object(json!({ "0": "x" }))).unwrap_err();
        assert!(matches!(err, CollectionError::MissingPrototype));
    }

    #[test]
    fn zero_count_sends_everything_through_growth() {
        let mut c = prepared(0, Element::new("tag"));
        assert!(c.is_empty());
        c.populate_values(&object(json!({ "a": 1, "b": 2 }))).unwrap();
        let names: Vec<&str> = c.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn configured_placeholder_names_the_template() {
        let c = Collection::with_options(
            "items",
            CollectionOptions::default()
                .target_element(Element::new("tag"))
                .should_create_template(true)
                .template_placeholder("__row__"),
        )
        .unwrap();
        assert!(c.has("__row__"));
        assert!(!c.has(DEFAULT_TEMPLATE_PLACEHOLDER));
        assert_eq!(c.template_element().map(Field::name), Some("__row__"));
    }

    #[test]
    fn options_template_follows_numbered_instances() {
        let c = Collection::with_options(
            "items",
            CollectionOptions::default()
                .target_element(Element::new("tag"))
                .count(3)
                .should_create_template(true),
        )
        .unwrap();
        let names: Vec<&str> = c.names().collect();
        assert_eq!(names, vec!["0", "1", "2", DEFAULT_TEMPLATE_PLACEHOLDER]);
    }

    #[test]
    fn data_for_template_leaves_it_untouched() {
        let mut c = prepared(1, Element::new("tag"));
        c.set_should_create_template(true).unwrap();
        c.populate_values(&object(json!({ "0": "x", "__index__": "submitted" })))
            .unwrap();
        assert_eq!(c.template_element().unwrap().to_value(), Value::Null);
        assert_eq!(c.element("0").unwrap().value(), Some(&json!("x")));

        // Inside the window the entry is dropped too, not reported as missing.
        let mut c = prepared(2, Element::new("tag"));
        c.set_should_create_template(true).unwrap();
        c.populate_values(&object(json!({ "__index__": "submitted", "1": "y" })))
            .unwrap();
        assert_eq!(c.template_element().unwrap().to_value(), Value::Null);
        assert_eq!(c.element("1").unwrap().value(), Some(&json!("y")));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn values_skip_template() {
        let mut c = prepared(1, Element::new("tag"));
        c.set_should_create_template(true).unwrap();
        c.populate_values(&object(json!({ "0": "x" }))).unwrap();
        assert_eq!(Value::Object(c.values()), json!({ "0": "x" }));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn removal_frees_the_name_for_preparation() {
        let mut c = prepared(2, Element::new("tag"));
        assert!(c.remove("1").is_some());
        assert_eq!(c.len(), 1);
        c.prepare().unwrap();
        let names: Vec<&str> = c.names().collect();
        assert_eq!(names, vec!["0", "1"]);
    }
}
