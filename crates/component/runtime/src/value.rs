//! Attribute values
//!
//! `Value` is a cheap-to-clone handle: arrays and components are shared by
//! reference. Arrays are observable and copy-on-write; an array remembers the
//! attribute (or outer array) currently holding it and notifies it on every
//! in-place mutation. Embedded components are linked to their holder the same
//! way; referenced components are not.

use crate::attribute::{Attribute, AttributeInner};
use crate::component::Component;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;
use std::sync::{Arc, Weak};

/// A value held by an attribute
#[derive(Clone)]
pub enum Value {
    /// Explicit undefined, accepted by optional types only
    Undefined,
    Boolean(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Object(JsonMap<String, JsonValue>),
    Array(ArrayValue),
    Component(Component),
}

impl Value {
    /// Human-readable type used in type-mismatch errors
    pub fn type_name(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Date(_) => "Date".to_string(),
            Value::Object(_) => "object".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Component(component) if component.is_class() => {
                format!("typeof {}", component.type_name())
            }
            Value::Component(component) => component.type_name().to_string(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsonMap<String, JsonValue>> {
        match self {
            Value::Object(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Value::Component(value) => Some(value),
            _ => None,
        }
    }

    /// Link this value to its holder so in-place changes notify upward.
    pub(crate) fn attach(&self, parent: ValueParent) {
        match self {
            Value::Array(array) => array.set_parent(parent),
            Value::Component(component) if component.is_embedded() => {
                component.set_parent(parent)
            }
            _ => {}
        }
    }

    pub(crate) fn detach(&self, parent: &ValueParent) {
        match self {
            Value::Array(array) => array.clear_parent_if(parent),
            Value::Component(component) if component.is_embedded() => {
                component.clear_parent_if(parent)
            }
            _ => {}
        }
    }

    /// Copy-on-write copy for a forked holder. Arrays share storage until
    /// one side writes; embedded components are forked; everything else is
    /// cloned.
    pub(crate) fn fork(&self) -> Value {
        match self {
            Value::Array(array) => Value::Array(array.fork()),
            Value::Component(component) if component.is_embedded() => {
                Value::Component(component.fork())
            }
            other => other.clone(),
        }
    }

    pub(crate) fn needs_deep_fork(&self) -> bool {
        match self {
            Value::Array(_) => true,
            Value::Component(component) => component.is_embedded(),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b) || a.items() == b.items(),
            (Value::Component(a), Value::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Boolean(value) => write!(f, "{:?}", value),
            Value::Number(value) => write!(f, "{:?}", value),
            Value::String(value) => write!(f, "{:?}", value),
            Value::Date(value) => write!(f, "Date({})", value.to_rfc3339()),
            Value::Object(value) => write!(f, "{:?}", value),
            Value::Array(value) => write!(f, "{:?}", value),
            Value::Component(value) => write!(f, "{:?}", value),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayValue::new(items))
    }
}

impl From<ArrayValue> for Value {
    fn from(array: ArrayValue) -> Self {
        Value::Array(array)
    }
}

impl From<Component> for Value {
    fn from(component: Component) -> Self {
        Value::Component(component)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}

/// Holder a value reports in-place changes to
#[derive(Clone)]
pub(crate) enum ValueParent {
    Attribute(Weak<AttributeInner>),
    Array(Weak<ArrayInner>),
}

impl ValueParent {
    pub(crate) fn notify(&self) {
        match self {
            ValueParent::Attribute(attribute) => {
                if let Some(inner) = attribute.upgrade() {
                    Attribute::from_inner(inner).value_mutated();
                }
            }
            ValueParent::Array(array) => {
                if let Some(inner) = array.upgrade() {
                    ArrayValue { inner }.notify_parent();
                }
            }
        }
    }

    pub(crate) fn same_as(&self, other: &ValueParent) -> bool {
        match (self, other) {
            (ValueParent::Attribute(a), ValueParent::Attribute(b)) => Weak::ptr_eq(a, b),
            (ValueParent::Array(a), ValueParent::Array(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Observable, copy-on-write array
#[derive(Clone)]
pub struct ArrayValue {
    inner: Arc<ArrayInner>,
}

pub(crate) struct ArrayInner {
    state: RwLock<ArrayState>,
}

struct ArrayState {
    items: Arc<Vec<Value>>,
    parent: Option<ValueParent>,
}

impl ArrayValue {
    pub fn new(items: Vec<Value>) -> Self {
        let array = Self::from_shared(Arc::new(items));
        let parent = array.as_parent();
        for item in array.inner.state.read().items.iter() {
            item.attach(parent.clone());
        }
        array
    }

    fn from_shared(items: Arc<Vec<Value>>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                state: RwLock::new(ArrayState {
                    items,
                    parent: None,
                }),
            }),
        }
    }

    fn as_parent(&self) -> ValueParent {
        ValueParent::Array(Arc::downgrade(&self.inner))
    }

    /// Snapshot of the current items
    pub fn items(&self) -> Vec<Value> {
        self.inner.state.read().items.as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.state.read().items.get(index).cloned()
    }

    /// Same array handle (not merely equal contents)
    pub fn ptr_eq(&self, other: &ArrayValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True while both arrays still share one backing buffer
    pub fn shares_storage_with(&self, other: &ArrayValue) -> bool {
        Arc::ptr_eq(
            &self.inner.state.read().items,
            &other.inner.state.read().items,
        )
    }

    pub fn push(&self, value: Value) {
        self.write(|items| items.push(value.clone()));
        value.attach(self.as_parent());
        self.notify_parent();
    }

    pub fn pop(&self) -> Option<Value> {
        let removed = self.write(|items| items.pop())?;
        removed.detach(&self.as_parent());
        self.notify_parent();
        Some(removed)
    }

    /// Insert at `index`; returns false (and changes nothing) when out of bounds
    pub fn insert(&self, index: usize, value: Value) -> bool {
        let inserted = self.write(|items| {
            if index > items.len() {
                return false;
            }
            items.insert(index, value.clone());
            true
        });
        if inserted {
            value.attach(self.as_parent());
            self.notify_parent();
        }
        inserted
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let removed = self.write(|items| (index < items.len()).then(|| items.remove(index)))?;
        removed.detach(&self.as_parent());
        self.notify_parent();
        Some(removed)
    }

    /// Replace the item at `index`, returning the previous one. Assigning an
    /// equal value is a no-op.
    pub fn set(&self, index: usize, value: Value) -> Option<Value> {
        {
            let state = self.inner.state.read();
            match state.items.get(index) {
                None => return None,
                Some(current) if *current == value => return Some(current.clone()),
                Some(_) => {}
            }
        }
        let previous = self.write(|items| {
            items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, value.clone()))
        })?;
        previous.detach(&self.as_parent());
        value.attach(self.as_parent());
        self.notify_parent();
        Some(previous)
    }

    pub fn clear(&self) {
        let removed = self.write(std::mem::take);
        if removed.is_empty() {
            return;
        }
        let parent = self.as_parent();
        for item in &removed {
            item.detach(&parent);
        }
        self.notify_parent();
    }

    /// Copy-on-write fork. Flat arrays share the backing buffer; arrays
    /// holding nested arrays or embedded components fork their items.
    pub(crate) fn fork(&self) -> ArrayValue {
        let items = Arc::clone(&self.inner.state.read().items);
        if items.iter().any(Value::needs_deep_fork) {
            ArrayValue::new(items.iter().map(Value::fork).collect())
        } else {
            ArrayValue::from_shared(items)
        }
    }

    fn write<R>(&self, apply: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut state = self.inner.state.write();
        apply(Arc::make_mut(&mut state.items))
    }

    pub(crate) fn set_parent(&self, parent: ValueParent) {
        self.inner.state.write().parent = Some(parent);
    }

    pub(crate) fn clear_parent_if(&self, parent: &ValueParent) {
        let mut state = self.inner.state.write();
        if state
            .parent
            .as_ref()
            .is_some_and(|current| current.same_as(parent))
        {
            state.parent = None;
        }
    }

    pub(crate) fn notify_parent(&self) {
        let parent = self.inner.state.read().parent.clone();
        if let Some(parent) = parent {
            parent.notify();
        }
    }
}

impl fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items()).finish()
    }
}
