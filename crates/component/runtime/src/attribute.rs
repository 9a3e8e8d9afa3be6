//! Attributes: named, typed, observable value slots
//!
//! An attribute belongs to exactly one component (an instance or a class
//! component) and keeps a non-owning back-reference to it. Successful
//! mutations notify the attribute's observers, then its owner's.

use crate::accessor::DefaultValue;
use crate::component::{Component, ComponentInner};
use crate::errors::{ComponentError, ComponentResult};
use crate::observer::{ObserverId, ObserverSet};
use crate::spec::AttributeTemplate;
use crate::validator::ValidationFailure;
use crate::value::{Value, ValueParent};
use crate::value_type::ValueType;
use component_types::ValueSource;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub struct GetValueOptions {
    /// When false, reading an unset attribute without a default yields
    /// `Value::Undefined` instead of an error
    pub throw_if_unset: bool,
}

impl Default for GetValueOptions {
    fn default() -> Self {
        Self {
            throw_if_unset: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetValueOptions {
    pub source: ValueSource,
    /// Write and notify even when the new value equals the current one
    pub force: bool,
}

#[derive(Clone)]
pub struct Attribute {
    inner: Arc<AttributeInner>,
}

pub(crate) struct AttributeInner {
    template: Arc<AttributeTemplate>,
    owner: Weak<ComponentInner>,
    state: RwLock<AttributeState>,
    observers: ObserverSet,
}

struct AttributeState {
    value: Option<Value>,
    source: ValueSource,
    controlled: bool,
    active: bool,
}

impl Attribute {
    pub(crate) fn new(template: Arc<AttributeTemplate>, owner: Weak<ComponentInner>) -> Self {
        let initial = template.value.as_ref().map(Value::fork);
        let controlled = template.controlled;
        let attribute = Self {
            inner: Arc::new(AttributeInner {
                template,
                owner,
                state: RwLock::new(AttributeState {
                    value: None,
                    source: ValueSource::LOCAL,
                    controlled,
                    active: false,
                }),
                observers: ObserverSet::default(),
            }),
        };
        if let Some(value) = initial {
            attribute.store_initial(value);
        }
        attribute
    }

    pub(crate) fn from_inner(inner: Arc<AttributeInner>) -> Self {
        Self { inner }
    }

    fn as_parent(&self) -> ValueParent {
        ValueParent::Attribute(Arc::downgrade(&self.inner))
    }

    pub fn name(&self) -> &str {
        &self.inner.template.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.inner.template.value_type
    }

    pub fn template(&self) -> &Arc<AttributeTemplate> {
        &self.inner.template
    }

    pub fn owner(&self) -> ComponentResult<Component> {
        self.inner
            .owner
            .upgrade()
            .map(Component::from_inner)
            .ok_or_else(|| ComponentError::DetachedAttribute(self.name().to_string()))
    }

    /// `Owner.name`, as used in error messages
    pub fn label(&self) -> String {
        match self.inner.owner.upgrade() {
            Some(owner) => format!("{}.{}", Component::from_inner(owner).type_name(), self.name()),
            None => self.name().to_string(),
        }
    }

    pub fn ptr_eq(&self, other: &Attribute) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Value ────────────────────────────────────────────────────────

    pub fn get_value(&self) -> ComponentResult<Value> {
        self.get_value_with(GetValueOptions::default())
    }

    pub fn get_value_with(&self, options: GetValueOptions) -> ComponentResult<Value> {
        if let Some(accessor) = &self.inner.template.accessor {
            return accessor.get(&self.owner()?);
        }

        if let Some(value) = self.inner.state.read().value.clone() {
            return Ok(value);
        }

        if let Some(default) = &self.inner.template.default {
            let value = default.evaluate();
            self.check_type(&value)?;
            {
                let mut state = self.inner.state.write();
                if let Some(existing) = &state.value {
                    return Ok(existing.clone());
                }
                state.value = Some(value.clone());
            }
            value.attach(self.as_parent());
            return Ok(value);
        }

        if options.throw_if_unset {
            Err(ComponentError::UnsetValue {
                attribute: self.label(),
            })
        } else {
            Ok(Value::Undefined)
        }
    }

    pub fn set_value(&self, value: impl Into<Value>) -> ComponentResult<()> {
        self.set_value_with(value, SetValueOptions::default())
    }

    pub fn set_value_with(
        &self,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> ComponentResult<()> {
        if self.is_controlled() {
            return Err(ComponentError::ControlledAttribute {
                attribute: self.label(),
            });
        }
        self.assign(value.into(), options)
    }

    /// Type-checked write that ignores the controlled flag. Used by the
    /// owner's own mutation path and by deserialization.
    pub(crate) fn assign(&self, value: Value, options: SetValueOptions) -> ComponentResult<()> {
        self.check_type(&value)?;

        if let Some(accessor) = &self.inner.template.accessor {
            return accessor.set(&self.owner()?, value);
        }

        self.write_value(value, options);
        Ok(())
    }

    fn write_value(&self, value: Value, options: SetValueOptions) {
        let previous = {
            let mut state = self.inner.state.write();
            if !options.force && state.value.as_ref() == Some(&value) {
                return;
            }
            state.source = options.source;
            state.active = true;
            state.value.replace(value.clone())
        };

        let parent = self.as_parent();
        if let Some(previous) = previous {
            previous.detach(&parent);
        }
        value.attach(parent);

        trace!(attribute = %self.label(), source = %options.source, "value set");
        self.notify();
    }

    /// Store a value without activating the field or notifying anyone
    pub(crate) fn store_initial(&self, value: Value) {
        value.attach(self.as_parent());
        self.inner.state.write().value = Some(value);
    }

    pub fn unset_value(&self) -> ComponentResult<()> {
        if self.is_controlled() {
            return Err(ComponentError::ControlledAttribute {
                attribute: self.label(),
            });
        }
        self.clear();
        Ok(())
    }

    pub(crate) fn clear(&self) {
        let previous = self.inner.state.write().value.take();
        if let Some(previous) = previous {
            previous.detach(&self.as_parent());
            trace!(attribute = %self.label(), "value unset");
            self.notify();
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.template.accessor.is_some() || self.inner.state.read().value.is_some()
    }

    pub fn value_source(&self) -> ValueSource {
        self.inner.state.read().source
    }

    pub fn is_controlled(&self) -> bool {
        self.inner.state.read().controlled
    }

    pub fn mark_as_controlled(&self) {
        self.inner.state.write().controlled = true;
    }

    pub fn is_computed(&self) -> bool {
        self.inner.template.accessor.is_some()
    }

    pub fn get_default(&self) -> Option<&DefaultValue> {
        self.inner.template.default.as_ref()
    }

    pub fn evaluate_default(&self) -> Option<Value> {
        self.get_default().map(DefaultValue::evaluate)
    }

    fn check_type(&self, value: &Value) -> ComponentResult<()> {
        let value_type = self.value_type();
        if value_type.accepts(value) {
            Ok(())
        } else {
            Err(ComponentError::TypeMismatch {
                attribute: self.label(),
                expected: value_type.to_string(),
                received: value.type_name(),
            })
        }
    }

    // ── Validation ───────────────────────────────────────────────────

    pub fn run_validators(&self) -> ComponentResult<Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        self.collect_failures("", &mut failures)?;
        Ok(failures)
    }

    pub(crate) fn collect_failures(
        &self,
        path: &str,
        failures: &mut Vec<ValidationFailure>,
    ) -> ComponentResult<()> {
        if !self.is_set() {
            return Err(ComponentError::RunOnUnset {
                attribute: self.label(),
            });
        }
        let value = self.get_value()?;
        self.value_type().collect_failures(&value, path, failures)
    }

    pub fn validate(&self) -> ComponentResult<()> {
        let failures = self.run_validators()?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ComponentError::Validation {
                attribute: self.label(),
                failures,
            })
        }
    }

    /// False for failing validators and for unset attributes
    pub fn is_valid(&self) -> bool {
        self.run_validators()
            .map(|failures| failures.is_empty())
            .unwrap_or(false)
    }

    // ── Activation ───────────────────────────────────────────────────

    /// Whether the current value reflects loaded (or locally written) state
    pub fn is_active(&self) -> bool {
        self.inner.state.read().active
    }

    pub fn activate(&self) {
        self.inner.state.write().active = true;
    }

    pub fn deactivate(&self) {
        self.inner.state.write().active = false;
    }

    // ── Forking and observers ────────────────────────────────────────

    /// Copy of this attribute owned by `owner`. Arrays share storage until
    /// either side writes; observers are not carried over.
    pub(crate) fn fork(&self, owner: Weak<ComponentInner>) -> Attribute {
        let (value, source, controlled, active) = {
            let state = self.inner.state.read();
            (state.value.clone(), state.source, state.controlled, state.active)
        };
        let forked = Attribute {
            inner: Arc::new(AttributeInner {
                template: Arc::clone(&self.inner.template),
                owner,
                state: RwLock::new(AttributeState {
                    value: None,
                    source,
                    controlled,
                    active,
                }),
                observers: ObserverSet::default(),
            }),
        };
        if let Some(value) = value {
            forked.store_initial(value.fork());
        }
        forked
    }

    pub fn add_observer(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverId {
        self.inner.observers.add(Arc::new(observer))
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    pub(crate) fn notify(&self) {
        self.inner.observers.call();
        if let Some(owner) = self.inner.owner.upgrade() {
            Component::from_inner(owner).notify();
        }
    }

    /// A value held by this attribute was changed in place
    pub(crate) fn value_mutated(&self) {
        {
            let mut state = self.inner.state.write();
            state.active = true;
            state.source = ValueSource::LOCAL;
        }
        trace!(attribute = %self.label(), "value mutated in place");
        self.notify();
    }

    /// Current value without evaluating defaults or getters
    pub(crate) fn peek(&self) -> Option<Value> {
        self.inner.state.read().value.clone()
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name())
            .field("value_type", &self.value_type().to_string())
            .field("value", &self.peek())
            .finish()
    }
}
