//! Computed attribute access and defaults

use crate::component::Component;
use crate::errors::{ComponentError, ComponentResult};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Computed access to an attribute. The owner is passed explicitly.
pub trait ValueAccessor: Send + Sync {
    fn get(&self, owner: &Component) -> ComponentResult<Value>;

    fn set(&self, owner: &Component, value: Value) -> ComponentResult<()> {
        let _ = value;
        Err(ComponentError::Configuration(format!(
            "cannot set a computed attribute without a setter (component: `{}`)",
            owner.type_name()
        )))
    }

    fn is_settable(&self) -> bool {
        false
    }
}

pub type GetterFn = Arc<dyn Fn(&Component) -> ComponentResult<Value> + Send + Sync>;
pub type SetterFn = Arc<dyn Fn(&Component, Value) -> ComponentResult<()> + Send + Sync>;

/// Accessor assembled from a getter and an optional setter
pub struct FnAccessor {
    getter: GetterFn,
    setter: Option<SetterFn>,
}

impl FnAccessor {
    pub fn new(getter: GetterFn, setter: Option<SetterFn>) -> Self {
        Self { getter, setter }
    }
}

impl ValueAccessor for FnAccessor {
    fn get(&self, owner: &Component) -> ComponentResult<Value> {
        (self.getter)(owner)
    }

    fn set(&self, owner: &Component, value: Value) -> ComponentResult<()> {
        match &self.setter {
            Some(setter) => setter(owner, value),
            None => Err(ComponentError::Configuration(format!(
                "cannot set a computed attribute without a setter (component: `{}`)",
                owner.type_name()
            ))),
        }
    }

    fn is_settable(&self) -> bool {
        self.setter.is_some()
    }
}

/// Default of an attribute: a constant or a zero-argument evaluator
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    Evaluator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Constants are forked so instances never share a mutable array.
    pub fn evaluate(&self) -> Value {
        match self {
            DefaultValue::Constant(value) => value.fork(),
            DefaultValue::Evaluator(evaluator) => evaluator(),
        }
    }

    pub fn is_evaluator(&self) -> bool {
        matches!(self, DefaultValue::Evaluator(_))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            DefaultValue::Evaluator(_) => write!(f, "Evaluator(..)"),
        }
    }
}
