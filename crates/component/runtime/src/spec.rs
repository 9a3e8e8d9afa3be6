//! Attribute and method declarations
//!
//! `AttributeSpec` is the builder used to declare an attribute on a component
//! type (or on a single instance). Declarations are checked and turned into
//! an immutable [`AttributeTemplate`] when the type is built, so the value
//! type string is parsed exactly once.

use crate::accessor::{DefaultValue, FnAccessor, GetterFn, SetterFn, ValueAccessor};
use crate::component::Component;
use crate::errors::{ComponentError, ComponentResult};
use crate::validator::Validator;
use crate::value::Value;
use crate::value_type::ValueType;
use component_types::{Exposure, TypeExpr};
use std::fmt;
use std::sync::Arc;

/// Validators for array items; `items` nests one level deeper
#[derive(Debug, Clone, Default)]
pub struct ItemsSpec {
    pub validators: Vec<Validator>,
    pub items: Option<Box<ItemsSpec>>,
}

impl ItemsSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn items(mut self, items: ItemsSpec) -> Self {
        self.items = Some(Box::new(items));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub exposure: Option<Exposure>,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exposure: None,
        }
    }

    pub fn exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = Some(exposure);
        self
    }
}

/// Attribute declaration builder
#[derive(Clone)]
pub struct AttributeSpec {
    name: String,
    value_type: String,
    value: Option<Value>,
    default: Option<DefaultValue>,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    accessor: Option<Arc<dyn ValueAccessor>>,
    validators: Vec<Validator>,
    items: Option<ItemsSpec>,
    exposure: Option<Exposure>,
    transient: bool,
    controlled: bool,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            value: None,
            default: None,
            getter: None,
            setter: None,
            accessor: None,
            validators: Vec::new(),
            items: None,
            exposure: None,
            transient: false,
            controlled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial value
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Constant(value.into()));
        self
    }

    pub fn default_with(mut self, evaluator: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Evaluator(Arc::new(evaluator)));
        self
    }

    pub fn getter(
        mut self,
        getter: impl Fn(&Component) -> ComponentResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn setter(
        mut self,
        setter: impl Fn(&Component, Value) -> ComponentResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn accessor(mut self, accessor: Arc<dyn ValueAccessor>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn validators(mut self, validators: impl IntoIterator<Item = Validator>) -> Self {
        self.validators.extend(validators);
        self
    }

    pub fn items(mut self, items: ItemsSpec) -> Self {
        self.items = Some(items);
        self
    }

    pub fn exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = Some(exposure);
        self
    }

    /// Never persisted by the storable layer
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Rejects `set_value`; the owner changes it through `write_controlled`
    pub fn controlled(mut self) -> Self {
        self.controlled = true;
        self
    }

    /// Check the declaration and freeze it. `owner` only labels errors.
    pub fn into_template(self, owner: &str) -> ComponentResult<AttributeTemplate> {
        let label = format!("{}.{}", owner, self.name);
        let misconfigured = |reason: &str| {
            ComponentError::Configuration(format!("{} (attribute: `{}`)", reason, label))
        };

        if self.name.is_empty() {
            return Err(ComponentError::Configuration(format!(
                "attribute names cannot be empty (component: `{}`)",
                owner
            )));
        }
        if self.setter.is_some() && self.getter.is_none() {
            return Err(misconfigured("an attribute cannot have a setter without a getter"));
        }
        let computed = self.getter.is_some() || self.accessor.is_some();
        if self.getter.is_some() && self.accessor.is_some() {
            return Err(misconfigured("an attribute cannot have both a getter and an accessor"));
        }
        if computed && self.value.is_some() {
            return Err(misconfigured(
                "an attribute cannot have both a getter and an initial value",
            ));
        }
        if computed && self.default.is_some() {
            return Err(misconfigured("an attribute cannot have both a getter and a default value"));
        }

        let expr = TypeExpr::parse(&self.value_type)?;
        let value_type = ValueType::build(&expr, self.validators, self.items.as_ref())?;

        let accessor = match (self.accessor, self.getter) {
            (Some(accessor), _) => Some(accessor),
            (None, Some(getter)) => {
                Some(Arc::new(FnAccessor::new(getter, self.setter)) as Arc<dyn ValueAccessor>)
            }
            (None, None) => None,
        };

        let check = |value: &Value| {
            if value_type.accepts(value) {
                Ok(())
            } else {
                Err(ComponentError::TypeMismatch {
                    attribute: label.clone(),
                    expected: value_type.to_string(),
                    received: value.type_name(),
                })
            }
        };
        if let Some(value) = &self.value {
            check(value)?;
        }
        if let Some(DefaultValue::Constant(value)) = &self.default {
            check(value)?;
        }

        Ok(AttributeTemplate {
            name: self.name,
            value_type,
            accessor,
            default: self.default,
            value: self.value,
            exposure: self.exposure,
            transient: self.transient,
            controlled: self.controlled,
        })
    }
}

impl fmt::Debug for AttributeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSpec")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("value", &self.value)
            .field("default", &self.default)
            .field("computed", &(self.getter.is_some() || self.accessor.is_some()))
            .field("validators", &self.validators)
            .field("exposure", &self.exposure)
            .finish()
    }
}

/// Checked, immutable attribute declaration shared by every instance
pub struct AttributeTemplate {
    pub(crate) name: String,
    pub(crate) value_type: ValueType,
    pub(crate) accessor: Option<Arc<dyn ValueAccessor>>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) value: Option<Value>,
    pub(crate) exposure: Option<Exposure>,
    pub(crate) transient: bool,
    pub(crate) controlled: bool,
}

impl AttributeTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn exposure(&self) -> Option<Exposure> {
        self.exposure
    }

    pub fn is_computed(&self) -> bool {
        self.accessor.is_some()
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Persisted by the storable layer: neither computed nor transient
    pub fn is_storable(&self) -> bool {
        !self.is_computed() && !self.transient
    }
}

impl fmt::Debug for AttributeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeTemplate")
            .field("name", &self.name)
            .field("value_type", &self.value_type.to_string())
            .field("computed", &self.is_computed())
            .field("transient", &self.transient)
            .field("controlled", &self.controlled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn getter() -> impl Fn(&Component) -> ComponentResult<Value> + Send + Sync + 'static {
        |_| Ok(Value::from("computed"))
    }

    fn is_configuration_error(result: ComponentResult<AttributeTemplate>) -> bool {
        matches!(result, Err(ComponentError::Configuration(_)))
    }

    #[test]
    fn setter_requires_getter() {
        let spec = AttributeSpec::new("title", "string").setter(|_, _| Ok(()));
        assert!(is_configuration_error(spec.into_template("Movie")));
    }

    #[test]
    fn getter_excludes_value_and_default() {
        let with_value = AttributeSpec::new("title", "string").getter(getter()).value("x");
        assert!(is_configuration_error(with_value.into_template("Movie")));

        let with_default = AttributeSpec::new("title", "string").getter(getter()).default("x");
        assert!(is_configuration_error(with_default.into_template("Movie")));

        let paired = AttributeSpec::new("title", "string")
            .getter(getter())
            .setter(|_, _| Ok(()));
        let template = paired.into_template("Movie").unwrap();
        assert!(template.is_computed());
        assert!(!template.is_storable());
    }

    #[test]
    fn initial_value_is_type_checked() {
        let err = AttributeSpec::new("year", "number")
            .value("1999")
            .into_template("Movie")
            .unwrap_err();
        assert!(matches!(err, ComponentError::TypeMismatch { .. }));
    }

    #[test]
    fn malformed_value_type_is_rejected() {
        let spec = AttributeSpec::new("title", "string]");
        assert!(is_configuration_error(spec.into_template("Movie")));
    }
}
