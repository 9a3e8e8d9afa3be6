//! Component instances
//!
//! A `Component` is a shared handle to one live entity (or to the class-level
//! component of a type). Attributes are materialized per component; a forked
//! component starts with no attributes of its own and delegates to its base
//! until an attribute is first accessed, at which point that attribute alone
//! is forked.

use crate::attribute::{Attribute, GetValueOptions, SetValueOptions};
use crate::component_type::ComponentType;
use crate::errors::{ComponentError, ComponentResult};
use crate::observer::{ObserverId, ObserverSet};
use crate::spec::{AttributeSpec, AttributeTemplate};
use crate::validator::ValidationFailure;
use crate::value::{Value, ValueParent};
use crate::value_type::join_path;
use component_types::wire;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

pub(crate) struct ComponentInner {
    component_type: ComponentType,
    class: bool,
    slots: RwLock<Vec<Slot>>,
    base: Option<Component>,
    is_new: AtomicBool,
    observers: ObserverSet,
    parent: RwLock<Option<ValueParent>>,
}

struct Slot {
    template: Arc<AttributeTemplate>,
    /// `None` until materialized on a fork
    attribute: Option<Attribute>,
}

impl Component {
    pub(crate) fn new_instance(component_type: &ComponentType) -> Self {
        Self::materialize(component_type, component_type.attribute_templates(), false)
    }

    pub(crate) fn new_class(component_type: &ComponentType) -> Self {
        Self::materialize(component_type, component_type.class_attribute_templates(), true)
    }

    fn materialize(
        component_type: &ComponentType,
        templates: &[Arc<AttributeTemplate>],
        class: bool,
    ) -> Self {
        let inner = Arc::new_cyclic(|owner: &Weak<ComponentInner>| ComponentInner {
            component_type: component_type.clone(),
            class,
            slots: RwLock::new(
                templates
                    .iter()
                    .map(|template| Slot {
                        template: Arc::clone(template),
                        attribute: Some(Attribute::new(Arc::clone(template), owner.clone())),
                    })
                    .collect(),
            ),
            base: None,
            is_new: AtomicBool::new(!class),
            observers: ObserverSet::default(),
            parent: RwLock::new(None),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<ComponentInner>) -> Self {
        Self { inner }
    }

    pub fn component_type(&self) -> &ComponentType {
        &self.inner.component_type
    }

    pub fn type_name(&self) -> &str {
        self.inner.component_type.name()
    }

    /// True for the type-level component holding class attributes
    pub fn is_class(&self) -> bool {
        self.inner.class
    }

    pub fn is_embedded(&self) -> bool {
        self.inner.component_type.is_embedded()
    }

    /// Same live component
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The component this one was forked from
    pub fn base(&self) -> Option<&Component> {
        self.inner.base.as_ref()
    }

    // ── Attributes ───────────────────────────────────────────────────

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner
            .slots
            .read()
            .iter()
            .any(|slot| slot.template.name() == name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.inner
            .slots
            .read()
            .iter()
            .map(|slot| slot.template.name().to_string())
            .collect()
    }

    pub(crate) fn template(&self, name: &str) -> Option<Arc<AttributeTemplate>> {
        self.inner
            .slots
            .read()
            .iter()
            .find(|slot| slot.template.name() == name)
            .map(|slot| Arc::clone(&slot.template))
    }

    /// The attribute named `name`, forking it from the base on first access
    pub fn attribute(&self, name: &str) -> ComponentResult<Attribute> {
        {
            let slots = self.inner.slots.read();
            match slots.iter().find(|slot| slot.template.name() == name) {
                Some(Slot {
                    attribute: Some(attribute),
                    ..
                }) => return Ok(attribute.clone()),
                Some(_) => {}
                None => return Err(self.unknown_attribute(name)),
            }
        }

        let base = self
            .inner
            .base
            .as_ref()
            .ok_or_else(|| self.unknown_attribute(name))?;
        let forked = match base.attribute(name) {
            Ok(source) => source.fork(Arc::downgrade(&self.inner)),
            Err(ComponentError::UnknownAttribute { .. }) => {
                let template = self.template(name).ok_or_else(|| self.unknown_attribute(name))?;
                Attribute::new(template, Arc::downgrade(&self.inner))
            }
            Err(err) => return Err(err),
        };

        let mut slots = self.inner.slots.write();
        let slot = slots
            .iter_mut()
            .find(|slot| slot.template.name() == name)
            .ok_or_else(|| self.unknown_attribute(name))?;
        Ok(slot.attribute.get_or_insert(forked).clone())
    }

    /// Every attribute in schema order (materializing them on a fork)
    pub fn attributes(&self) -> ComponentResult<Vec<Attribute>> {
        self.attribute_names()
            .iter()
            .map(|name| self.attribute(name))
            .collect()
    }

    /// Drop every stored value; only used on instances nobody observes yet
    pub(crate) fn clear_stored_values(&self) {
        let attributes: Vec<Attribute> = self
            .inner
            .slots
            .read()
            .iter()
            .filter_map(|slot| slot.attribute.clone())
            .collect();
        for attribute in attributes {
            attribute.clear();
        }
    }

    fn is_materialized(&self, name: &str) -> bool {
        self.materialized_attribute(name).is_some()
    }

    pub(crate) fn materialized_attribute(&self, name: &str) -> Option<Attribute> {
        self.inner
            .slots
            .read()
            .iter()
            .find(|slot| slot.template.name() == name)
            .and_then(|slot| slot.attribute.clone())
    }

    fn unknown_attribute(&self, name: &str) -> ComponentError {
        ComponentError::UnknownAttribute {
            component: self.type_name().to_string(),
            attribute: name.to_string(),
        }
    }

    pub fn get(&self, name: &str) -> ComponentResult<Value> {
        self.get_with(name, GetValueOptions::default())
    }

    /// Reads on a fork delegate to the base while the attribute is not yet
    /// materialized, unless the value is mutable in place or computed.
    pub fn get_with(&self, name: &str, options: GetValueOptions) -> ComponentResult<Value> {
        if !self.is_materialized(name) {
            if let Some(base) = &self.inner.base {
                let computed = self.template(name).is_some_and(|template| template.is_computed());
                if !computed {
                    let value = base.get_with(name, options)?;
                    if !value.needs_deep_fork() {
                        return Ok(value);
                    }
                }
            }
        }
        self.attribute(name)?.get_value_with(options)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> ComponentResult<()> {
        self.attribute(name)?.set_value(value)
    }

    pub fn set_with(
        &self,
        name: &str,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> ComponentResult<()> {
        self.attribute(name)?.set_value_with(value, options)
    }

    pub fn unset(&self, name: &str) -> ComponentResult<()> {
        self.attribute(name)?.unset_value()
    }

    /// Write a controlled attribute through the owner's own mutation path
    pub fn write_controlled(&self, name: &str, value: impl Into<Value>) -> ComponentResult<()> {
        self.attribute(name)?
            .assign(value.into(), SetValueOptions::default())
    }

    /// Add an attribute to this component only
    pub fn define_attribute(&self, spec: AttributeSpec) -> ComponentResult<Attribute> {
        let template = Arc::new(spec.into_template(self.type_name())?);
        let mut slots = self.inner.slots.write();
        if slots.iter().any(|slot| slot.template.name() == template.name()) {
            return Err(ComponentError::Configuration(format!(
                "attribute `{}` is already defined on component `{}`",
                template.name(),
                self.type_name()
            )));
        }
        let attribute = Attribute::new(Arc::clone(&template), Arc::downgrade(&self.inner));
        slots.push(Slot {
            template,
            attribute: Some(attribute.clone()),
        });
        Ok(attribute)
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Value of the `id` attribute, when the type has one and it is set
    pub fn id(&self) -> ComponentResult<Option<String>> {
        if !self.has_attribute(wire::IDENTIFIER) {
            return Ok(None);
        }
        let value = self.get_with(
            wire::IDENTIFIER,
            GetValueOptions {
                throw_if_unset: false,
            },
        )?;
        Ok(value.as_str().map(str::to_string))
    }

    pub fn is_new(&self) -> bool {
        self.inner.is_new.load(Ordering::SeqCst)
    }

    pub fn mark_as_new(&self) {
        self.inner.is_new.store(true, Ordering::SeqCst);
    }

    pub fn mark_as_not_new(&self) {
        self.inner.is_new.store(false, Ordering::SeqCst);
    }

    // ── Forking ──────────────────────────────────────────────────────

    /// Copy-on-write derivation: the fork owns no attributes until each is
    /// first accessed.
    pub fn fork(&self) -> Component {
        let slots: Vec<Slot> = self
            .inner
            .slots
            .read()
            .iter()
            .map(|slot| Slot {
                template: Arc::clone(&slot.template),
                attribute: None,
            })
            .collect();
        let inner = Arc::new(ComponentInner {
            component_type: self.inner.component_type.clone(),
            class: self.inner.class,
            slots: RwLock::new(slots),
            base: Some(self.clone()),
            is_new: AtomicBool::new(self.is_new()),
            observers: ObserverSet::default(),
            parent: RwLock::new(None),
        });
        trace!(component = %self.type_name(), "component forked");
        Self { inner }
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn add_observer(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverId {
        self.inner.observers.add(Arc::new(observer))
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    /// Own observers first, then the holder of this component when embedded
    pub(crate) fn notify(&self) {
        self.inner.observers.call();
        let parent = self.inner.parent.read().clone();
        if let Some(parent) = parent {
            parent.notify();
        }
    }

    pub(crate) fn set_parent(&self, parent: ValueParent) {
        *self.inner.parent.write() = Some(parent);
    }

    pub(crate) fn clear_parent_if(&self, parent: &ValueParent) {
        let mut current = self.inner.parent.write();
        if current.as_ref().is_some_and(|existing| existing.same_as(parent)) {
            *current = None;
        }
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Failures of every set attribute, with paths such as `title`,
    /// `tags[1]` or `author.name`. Unset attributes are skipped.
    pub fn run_validators(&self) -> ComponentResult<Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        self.collect_failures("", &mut failures)?;
        Ok(failures)
    }

    pub(crate) fn collect_failures(
        &self,
        base: &str,
        failures: &mut Vec<ValidationFailure>,
    ) -> ComponentResult<()> {
        for attribute in self.attributes()? {
            if attribute.is_set() {
                attribute.collect_failures(&join_path(base, attribute.name()), failures)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> ComponentResult<()> {
        let failures = self.run_validators()?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ComponentError::ComponentValidation {
                component: self.type_name().to_string(),
                failures,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.run_validators()
            .map(|failures| failures.is_empty())
            .unwrap_or(false)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.type_name());
        if self.is_class() {
            debug.field("class", &true);
        } else if let Ok(Some(id)) = self.id() {
            debug.field("id", &id);
        }
        debug.field("is_new", &self.is_new()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validator;
    use std::sync::atomic::AtomicUsize;

    fn counter(component: &Component) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        component.add_observer(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });
        calls
    }

    fn types() -> (ComponentType, ComponentType, ComponentType) {
        let address = ComponentType::builder("Address")
            .embedded()
            .attribute(AttributeSpec::new("city", "string").validator(Validator::not_empty()))
            .build()
            .unwrap();
        let director = ComponentType::builder("Director")
            .attribute(AttributeSpec::new("name", "string"))
            .build()
            .unwrap();
        let movie = ComponentType::builder("Movie")
            .attribute(AttributeSpec::new("id", "string"))
            .attribute(AttributeSpec::new("title", "string").validator(Validator::not_empty()))
            .attribute(AttributeSpec::new("tags", "string[]").value(Vec::<Value>::new()))
            .attribute(AttributeSpec::new("address", "Address?"))
            .attribute(AttributeSpec::new("director", "Director?"))
            .build()
            .unwrap();
        (movie, address, director)
    }

    #[test]
    fn attribute_changes_reach_the_owner() {
        let (movie_type, _, _) = types();
        let movie = movie_type.instantiate();
        let calls = counter(&movie);

        movie.set("title", "Inception").unwrap();
        movie.set("title", "Inception").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        movie.get("tags").unwrap().as_array().unwrap().push(Value::from("a"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn embedded_components_notify_their_holder() {
        let (movie_type, address_type, director_type) = types();
        let movie = movie_type.instantiate();
        let address = address_type.instantiate();
        let director = director_type.instantiate();
        movie.set("address", address.clone()).unwrap();
        movie.set("director", director.clone()).unwrap();
        let calls = counter(&movie);

        address.set("city", "Paris").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        director.set("name", "Nolan").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        movie.unset("address").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        address.set("city", "Rome").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fork_is_isolated_both_ways() {
        let (movie_type, _, _) = types();
        let movie = movie_type.instantiate();
        movie.set("title", "Inception").unwrap();
        movie.get("tags").unwrap().as_array().unwrap().push(Value::from("a"));

        let fork = movie.fork();
        assert_eq!(fork.get("title").unwrap(), Value::from("Inception"));

        fork.set("title", "Tenet").unwrap();
        assert_eq!(movie.get("title").unwrap(), Value::from("Inception"));
        movie.set("title", "Memento").unwrap();
        assert_eq!(fork.get("title").unwrap(), Value::from("Tenet"));

        let forked_tags = fork.get("tags").unwrap();
        forked_tags.as_array().unwrap().push(Value::from("b"));
        assert_eq!(movie.get("tags").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(forked_tags.as_array().unwrap().len(), 2);
    }

    #[test]
    fn unmaterialized_reads_delegate_to_the_base() {
        let (movie_type, _, _) = types();
        let movie = movie_type.instantiate();
        movie.set("title", "Inception").unwrap();
        let fork = movie.fork();

        movie.set("title", "Memento").unwrap();
        assert_eq!(fork.get("title").unwrap(), Value::from("Memento"));

        fork.attribute("title").unwrap();
        movie.set("title", "Tenet").unwrap();
        assert_eq!(fork.get("title").unwrap(), Value::from("Memento"));
    }

    #[test]
    fn fork_observers_are_independent() {
        let (movie_type, _, _) = types();
        let movie = movie_type.instantiate();
        let fork = movie.fork();
        let base_calls = counter(&movie);
        let fork_calls = counter(&fork);

        fork.set("title", "Tenet").unwrap();
        assert_eq!(base_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fork_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn define_attribute_is_per_instance() {
        let (movie_type, _, _) = types();
        let movie = movie_type.instantiate();
        let other = movie_type.instantiate();

        movie
            .define_attribute(AttributeSpec::new("note", "string").value("private"))
            .unwrap();
        assert_eq!(movie.get("note").unwrap(), Value::from("private"));
        assert!(matches!(
            other.get("note"),
            Err(ComponentError::UnknownAttribute { .. })
        ));
        assert!(movie
            .define_attribute(AttributeSpec::new("title", "string"))
            .is_err());

        let fork = movie.fork();
        assert_eq!(fork.get("note").unwrap(), Value::from("private"));
    }

    #[test]
    fn component_validation_paths() {
        let (movie_type, address_type, _) = types();
        let movie = movie_type.instantiate();
        movie.set("title", "").unwrap();
        let address = address_type.instantiate();
        address.set("city", "").unwrap();
        movie.set("address", address).unwrap();

        let failures = movie.run_validators().unwrap();
        let paths: Vec<&str> = failures.iter().map(|failure| failure.path.as_str()).collect();
        assert_eq!(paths, vec!["title", "address.city"]);
        assert!(!movie.is_valid());
        assert!(matches!(
            movie.validate(),
            Err(ComponentError::ComponentValidation { .. })
        ));
    }

    #[test]
    fn identity_and_new_flag() {
        let (movie_type, _, _) = types();
        let movie = movie_type.instantiate();
        assert!(movie.is_new());
        assert_eq!(movie.id().unwrap(), None);
        movie.set("id", "movie1").unwrap();
        assert_eq!(movie.id().unwrap(), Some("movie1".to_string()));
        movie.mark_as_not_new();
        assert!(!movie.is_new());
        assert!(!movie.fork().is_new());
    }
}
