//! Component types and the type registry

use crate::component::Component;
use crate::errors::{ComponentError, ComponentResult};
use crate::spec::{AttributeSpec, AttributeTemplate, MethodSpec};
use component_types::is_component_name;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A named component schema: instance-level and class-level attributes and
/// methods. Cheap to clone.
#[derive(Clone)]
pub struct ComponentType {
    inner: Arc<ComponentTypeInner>,
}

struct ComponentTypeInner {
    name: String,
    embedded: bool,
    attributes: Vec<Arc<AttributeTemplate>>,
    class_attributes: Vec<Arc<AttributeTemplate>>,
    methods: Vec<MethodSpec>,
    class_methods: Vec<MethodSpec>,
    class_component: OnceLock<Component>,
}

impl ComponentType {
    pub fn builder(name: impl Into<String>) -> ComponentTypeBuilder {
        ComponentTypeBuilder {
            name: name.into(),
            embedded: false,
            attributes: Vec::new(),
            class_attributes: Vec::new(),
            methods: Vec::new(),
            class_methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Values of an embedded type are owned by their holder: they notify it,
    /// fork with it and are validated and serialized as part of it.
    pub fn is_embedded(&self) -> bool {
        self.inner.embedded
    }

    pub fn attribute_templates(&self) -> &[Arc<AttributeTemplate>] {
        &self.inner.attributes
    }

    pub fn class_attribute_templates(&self) -> &[Arc<AttributeTemplate>] {
        &self.inner.class_attributes
    }

    pub fn methods(&self) -> &[MethodSpec] {
        &self.inner.methods
    }

    pub fn class_methods(&self) -> &[MethodSpec] {
        &self.inner.class_methods
    }

    pub fn attribute_template(&self, name: &str) -> Option<&Arc<AttributeTemplate>> {
        self.inner
            .attributes
            .iter()
            .find(|template| template.name() == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_template(name).is_some()
    }

    /// Instance attributes persisted by the storable layer, in schema order
    pub fn storable_attribute_names(&self) -> Vec<String> {
        self.inner
            .attributes
            .iter()
            .filter(|template| template.is_storable())
            .map(|template| template.name().to_string())
            .collect()
    }

    /// New instance with every schema attribute materialized
    pub fn instantiate(&self) -> Component {
        Component::new_instance(self)
    }

    /// New instance whose attributes hold no value, not even the schema's
    /// initial values
    pub fn instantiate_empty(&self) -> Component {
        let component = Component::new_instance(self);
        component.clear_stored_values();
        component
    }

    /// The type-level component holding class attributes, created on first use
    pub fn class_component(&self) -> Component {
        self.inner
            .class_component
            .get_or_init(|| Component::new_class(self))
            .clone()
    }

    pub fn ptr_eq(&self, other: &ComponentType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.inner.name)
            .field("embedded", &self.inner.embedded)
            .field("attributes", &self.inner.attributes)
            .field("class_attributes", &self.inner.class_attributes)
            .finish()
    }
}

pub struct ComponentTypeBuilder {
    name: String,
    embedded: bool,
    attributes: Vec<AttributeSpec>,
    class_attributes: Vec<AttributeSpec>,
    methods: Vec<MethodSpec>,
    class_methods: Vec<MethodSpec>,
}

impl ComponentTypeBuilder {
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    pub fn class_attribute(mut self, spec: AttributeSpec) -> Self {
        self.class_attributes.push(spec);
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn class_method(mut self, method: MethodSpec) -> Self {
        self.class_methods.push(method);
        self
    }

    pub fn build(self) -> ComponentResult<ComponentType> {
        if !is_component_name(&self.name) {
            return Err(ComponentError::Configuration(format!(
                "invalid component name: '{}'",
                self.name
            )));
        }

        let attributes = freeze(&self.name, self.attributes, &self.methods)?;
        let class_attributes = freeze(&self.name, self.class_attributes, &self.class_methods)?;

        debug!(
            component = %self.name,
            attributes = attributes.len(),
            class_attributes = class_attributes.len(),
            "component type built"
        );

        Ok(ComponentType {
            inner: Arc::new(ComponentTypeInner {
                name: self.name,
                embedded: self.embedded,
                attributes,
                class_attributes,
                methods: self.methods,
                class_methods: self.class_methods,
                class_component: OnceLock::new(),
            }),
        })
    }
}

fn freeze(
    owner: &str,
    specs: Vec<AttributeSpec>,
    methods: &[MethodSpec],
) -> ComponentResult<Vec<Arc<AttributeTemplate>>> {
    let mut seen = HashSet::new();
    let method_names = methods.iter().map(|method| method.name.as_str());
    let attribute_names = specs.iter().map(AttributeSpec::name);
    for name in attribute_names.chain(method_names) {
        if !seen.insert(name.to_string()) {
            return Err(ComponentError::Configuration(format!(
                "duplicate property `{}` in component `{}`",
                name, owner
            )));
        }
    }

    specs
        .into_iter()
        .map(|spec| spec.into_template(owner).map(Arc::new))
        .collect()
}

/// Known component types, by name. Shared by clones.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    types: Arc<DashMap<String, ComponentType>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, component_type: ComponentType) -> ComponentResult<()> {
        let name = component_type.name().to_string();
        match self.types.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(ComponentError::Configuration(
                format!("component `{}` is already registered", entry.key()),
            )),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!(component = %entry.key(), "component type registered");
                entry.insert(component_type);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> ComponentResult<ComponentType> {
        self.types
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
