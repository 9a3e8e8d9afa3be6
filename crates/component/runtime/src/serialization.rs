//! Component serialization
//!
//! Wire format:
//!
//! ```text
//! {"__component": "Movie", "__new": true, "title": "Inception", "year": {"__undefined": true}}
//! {"__Component": "Movie", "limit": 100}
//! ```
//!
//! Attributes are walked in schema order. Embedded components are written in
//! full; referenced components are written as `{"__component": T, "id": ...}`.
//! Computed attributes are never serialized.

use crate::attribute::{Attribute, SetValueOptions};
use crate::component::Component;
use crate::component_type::{ComponentRegistry, ComponentType};
use crate::errors::{ComponentError, ComponentResult};
use crate::value::{ArrayValue, Value};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use component_types::{wire, FieldMask, ValueSource};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map as JsonMap, Number, Value as JsonValue};
use std::sync::Arc;
use tracing::warn;

/// Decides whether an attribute takes part in (de)serialization
#[async_trait]
pub trait PropertyFilter: Send + Sync {
    async fn include(&self, attribute: &Attribute) -> bool;
}

#[async_trait]
impl<F> PropertyFilter for F
where
    F: Fn(&Attribute) -> bool + Send + Sync,
{
    async fn include(&self, attribute: &Attribute) -> bool {
        self(attribute)
    }
}

#[derive(Clone, Default)]
pub struct SerializeOptions {
    pub property_filter: Option<Arc<dyn PropertyFilter>>,
    /// Top-level attributes to include; nested embedded components are
    /// always written in full
    pub fields: Option<FieldMask>,
}

impl SerializeOptions {
    pub fn with_fields(mut self, fields: FieldMask) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn PropertyFilter>) -> Self {
        self.property_filter = Some(filter);
        self
    }
}

pub async fn serialize(
    component: &Component,
    options: &SerializeOptions,
) -> ComponentResult<JsonValue> {
    let object = serialize_component(component, options, options.fields.as_ref()).await?;
    Ok(JsonValue::Object(object))
}

pub async fn serialize_value(
    value: &Value,
    options: &SerializeOptions,
) -> ComponentResult<JsonValue> {
    write_value(value, options).await
}

fn serialize_component<'a>(
    component: &'a Component,
    options: &'a SerializeOptions,
    fields: Option<&'a FieldMask>,
) -> BoxFuture<'a, ComponentResult<JsonMap<String, JsonValue>>> {
    async move {
        let mut object = JsonMap::new();
        if component.is_class() {
            object.insert(wire::COMPONENT_TYPE.to_string(), json!(component.type_name()));
        } else {
            object.insert(wire::COMPONENT.to_string(), json!(component.type_name()));
            if component.is_new() {
                object.insert(wire::NEW.to_string(), JsonValue::Bool(true));
            }
        }

        for attribute in component.attributes()? {
            if attribute.is_computed() {
                continue;
            }
            if fields.is_some_and(|fields| !fields.contains(attribute.name())) {
                continue;
            }
            if let Some(filter) = &options.property_filter {
                if !filter.include(&attribute).await {
                    continue;
                }
            }
            let value = attribute.peek().unwrap_or(Value::Undefined);
            let json = write_value(&value, options).await?;
            object.insert(attribute.name().to_string(), json);
        }
        Ok(object)
    }
    .boxed()
}

fn write_value<'a>(
    value: &'a Value,
    options: &'a SerializeOptions,
) -> BoxFuture<'a, ComponentResult<JsonValue>> {
    async move {
        match value {
            Value::Array(array) => {
                let mut items = Vec::with_capacity(array.len());
                for item in array.items() {
                    items.push(write_value(&item, options).await?);
                }
                Ok(JsonValue::Array(items))
            }
            Value::Component(component) if component.is_embedded() && !component.is_class() => {
                Ok(JsonValue::Object(serialize_component(component, options, None).await?))
            }
            other => plain_to_json(other),
        }
    }
    .boxed()
}

/// JSON for a value that needs no filter: scalars, dates, objects, arrays,
/// class markers and component references
pub(crate) fn plain_to_json(value: &Value) -> ComponentResult<JsonValue> {
    match value {
        Value::Undefined => Ok(marker(wire::UNDEFINED, JsonValue::Bool(true))),
        Value::Boolean(value) => Ok(JsonValue::Bool(*value)),
        Value::Number(value) => number_to_json(*value),
        Value::String(value) => Ok(JsonValue::String(value.clone())),
        Value::Date(value) => Ok(marker(
            wire::DATE,
            json!(value.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        )),
        Value::Object(value) => Ok(JsonValue::Object(value.clone())),
        Value::Array(array) => array
            .items()
            .iter()
            .map(plain_to_json)
            .collect::<ComponentResult<Vec<_>>>()
            .map(JsonValue::Array),
        Value::Component(component) if component.is_class() => {
            Ok(marker(wire::COMPONENT_TYPE, json!(component.type_name())))
        }
        Value::Component(component) => {
            let id = component.id()?.ok_or_else(|| {
                ComponentError::Serialization(format!(
                    "cannot reference a `{}` component without an identifier",
                    component.type_name()
                ))
            })?;
            let mut reference = JsonMap::new();
            reference.insert(wire::COMPONENT.to_string(), json!(component.type_name()));
            reference.insert(wire::IDENTIFIER.to_string(), JsonValue::String(id));
            Ok(JsonValue::Object(reference))
        }
    }
}

fn marker(key: &str, value: JsonValue) -> JsonValue {
    let mut object = JsonMap::new();
    object.insert(key.to_string(), value);
    JsonValue::Object(object)
}

fn number_to_json(value: f64) -> ComponentResult<JsonValue> {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Ok(JsonValue::from(value as i64));
    }
    Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or_else(|| {
            ComponentError::Serialization(format!("cannot serialize the number {}", value))
        })
}

/// Inverse of [`plain_to_json`] for values that hold no components
pub(crate) fn plain_from_json(json: &JsonValue) -> ComponentResult<Value> {
    match json {
        JsonValue::Null => Ok(Value::Undefined),
        JsonValue::Bool(value) => Ok(Value::Boolean(*value)),
        JsonValue::Number(number) => number
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| ComponentError::Serialization(format!("invalid number: {}", number))),
        JsonValue::String(value) => Ok(Value::String(value.clone())),
        JsonValue::Array(items) => {
            let items = items.iter().map(plain_from_json).collect::<ComponentResult<Vec<_>>>()?;
            Ok(Value::Array(ArrayValue::new(items)))
        }
        JsonValue::Object(object) => {
            if object.contains_key(wire::UNDEFINED) {
                return Ok(Value::Undefined);
            }
            if let Some(date) = object.get(wire::DATE) {
                return parse_date(date).map(Value::Date);
            }
            if object.contains_key(wire::COMPONENT) || object.contains_key(wire::COMPONENT_TYPE) {
                return Err(ComponentError::Serialization(
                    "component values require a component registry".to_string(),
                ));
            }
            Ok(Value::Object(object.clone()))
        }
    }
}

fn parse_date(json: &JsonValue) -> ComponentResult<DateTime<Utc>> {
    let text = json
        .as_str()
        .ok_or_else(|| ComponentError::Serialization(format!("invalid date: {}", json)))?;
    DateTime::parse_from_rfc3339(text)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|err| ComponentError::Serialization(format!("invalid date '{}': {}", text, err)))
}

/// Creates the component a wire object with `__component` deserializes into
pub trait ComponentFactory: Send + Sync {
    fn instantiate(
        &self,
        component_type: &ComponentType,
        id: Option<&str>,
        is_new: bool,
    ) -> ComponentResult<Component>;
}

/// Always creates a fresh instance
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComponentFactory;

impl ComponentFactory for DefaultComponentFactory {
    fn instantiate(
        &self,
        component_type: &ComponentType,
        _id: Option<&str>,
        is_new: bool,
    ) -> ComponentResult<Component> {
        let component = component_type.instantiate();
        if !is_new {
            component.mark_as_not_new();
        }
        Ok(component)
    }
}

#[derive(Clone)]
pub struct DeserializeOptions {
    pub registry: ComponentRegistry,
    pub factory: Arc<dyn ComponentFactory>,
    pub property_filter: Option<Arc<dyn PropertyFilter>>,
    /// Provenance recorded on every attribute written
    pub source: ValueSource,
    /// Leave attributes that are already active untouched
    pub preserve_active: bool,
}

impl DeserializeOptions {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            factory: Arc::new(DefaultComponentFactory),
            property_filter: None,
            source: ValueSource::LOCAL,
            preserve_active: false,
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ComponentFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn PropertyFilter>) -> Self {
        self.property_filter = Some(filter);
        self
    }

    pub fn with_source(mut self, source: ValueSource) -> Self {
        self.source = source;
        self
    }

    pub fn preserve_active(mut self, preserve: bool) -> Self {
        self.preserve_active = preserve;
        self
    }
}

pub async fn deserialize(json: &JsonValue, options: &DeserializeOptions) -> ComponentResult<Value> {
    read_value(json, options).await
}

/// Merge a wire object into an existing component
pub async fn deserialize_into(
    component: &Component,
    json: &JsonValue,
    options: &DeserializeOptions,
) -> ComponentResult<()> {
    let object = json.as_object().ok_or_else(|| {
        ComponentError::Serialization(format!(
            "expected an object for component `{}`",
            component.type_name()
        ))
    })?;

    let marker = if component.is_class() {
        wire::COMPONENT_TYPE
    } else {
        wire::COMPONENT
    };
    if let Some(name) = object.get(marker) {
        if name.as_str() != Some(component.type_name()) {
            return Err(ComponentError::Serialization(format!(
                "cannot deserialize a `{}` into a `{}` component",
                name,
                component.type_name()
            )));
        }
    }

    if !component.is_class() {
        match object.get(wire::NEW).and_then(JsonValue::as_bool) {
            Some(true) => component.mark_as_new(),
            Some(false) => component.mark_as_not_new(),
            None if object.contains_key(wire::COMPONENT) => component.mark_as_not_new(),
            None => {}
        }
    }

    read_fields(component, object, options).await
}

fn read_value<'a>(
    json: &'a JsonValue,
    options: &'a DeserializeOptions,
) -> BoxFuture<'a, ComponentResult<Value>> {
    async move {
        match json {
            JsonValue::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(read_value(item, options).await?);
                }
                Ok(Value::Array(ArrayValue::new(values)))
            }
            JsonValue::Object(object) => {
                if let Some(name) = object.get(wire::COMPONENT_TYPE) {
                    let component_type = options.registry.get(type_name(name)?)?;
                    let class = component_type.class_component();
                    read_fields(&class, object, options).await?;
                    return Ok(Value::Component(class));
                }
                if let Some(name) = object.get(wire::COMPONENT) {
                    let component_type = options.registry.get(type_name(name)?)?;
                    let id = object.get(wire::IDENTIFIER).and_then(JsonValue::as_str);
                    let is_new = object.get(wire::NEW).and_then(JsonValue::as_bool) == Some(true);
                    let component = options.factory.instantiate(&component_type, id, is_new)?;
                    read_fields(&component, object, options).await?;
                    return Ok(Value::Component(component));
                }
                plain_from_json(json)
            }
            other => plain_from_json(other),
        }
    }
    .boxed()
}

fn type_name(json: &JsonValue) -> ComponentResult<&str> {
    json.as_str()
        .ok_or_else(|| ComponentError::Serialization(format!("invalid component name: {}", json)))
}

async fn read_fields(
    component: &Component,
    object: &JsonMap<String, JsonValue>,
    options: &DeserializeOptions,
) -> ComponentResult<()> {
    for name in component.attribute_names() {
        let Some(json) = object.get(&name) else {
            continue;
        };
        let attribute = component.attribute(&name)?;
        if attribute.is_computed() {
            continue;
        }
        if options.preserve_active && attribute.is_active() {
            continue;
        }
        if let Some(filter) = &options.property_filter {
            if !filter.include(&attribute).await {
                continue;
            }
        }

        let value = read_value(json, options).await?;
        if value.is_undefined() && !attribute.value_type().is_optional() {
            attribute.clear();
        } else {
            attribute.assign(
                value,
                SetValueOptions {
                    source: options.source,
                    force: false,
                },
            )?;
        }
        attribute.activate();
    }

    for key in object.keys() {
        if !wire::is_marker(key) && !component.has_attribute(key) {
            warn!(
                component = %component.type_name(),
                attribute = %key,
                "ignoring unknown attribute"
            );
        }
    }
    Ok(())
}
