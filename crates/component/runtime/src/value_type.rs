//! Runtime value types
//!
//! A [`ValueType`] is built once from a parsed [`TypeExpr`] plus the
//! attribute's validators. It answers two questions: does a value conform
//! (checked on every assignment) and which business rules fail (checked on
//! demand).

use crate::errors::{ComponentError, ComponentResult};
use crate::spec::ItemsSpec;
use crate::validator::{ValidationFailure, Validator};
use crate::value::Value;
use component_types::{ScalarKind, TypeExpr, TypeKind};
use std::fmt;

#[derive(Debug, Clone)]
pub enum ValueKind {
    Any,
    Scalar(ScalarKind),
    Component(String),
    Array(Box<ValueType>),
}

#[derive(Debug, Clone)]
pub struct ValueType {
    kind: ValueKind,
    optional: bool,
    validators: Vec<Validator>,
}

impl ValueType {
    /// Build from an expression. `items` carries the validators of array
    /// items (recursively) and is rejected for non-array types.
    pub fn build(
        expr: &TypeExpr,
        validators: Vec<Validator>,
        items: Option<&ItemsSpec>,
    ) -> ComponentResult<Self> {
        let kind = match &expr.kind {
            TypeKind::Any => ValueKind::Any,
            TypeKind::Scalar(scalar) => ValueKind::Scalar(*scalar),
            TypeKind::Component(name) => ValueKind::Component(name.clone()),
            TypeKind::Array(item) => {
                let (item_validators, nested) = match items {
                    Some(spec) => (spec.validators.clone(), spec.items.as_deref()),
                    None => (Vec::new(), None),
                };
                ValueKind::Array(Box::new(ValueType::build(item, item_validators, nested)?))
            }
        };

        if items.is_some() && !matches!(kind, ValueKind::Array(_)) {
            return Err(ComponentError::Configuration(format!(
                "`items` can only be specified for array value types (value type: `{}`)",
                expr
            )));
        }

        Ok(Self {
            kind,
            optional: expr.optional,
            validators,
        })
    }

    pub fn parse(text: &str) -> ComponentResult<Self> {
        Self::build(&TypeExpr::parse(text)?, Vec::new(), None)
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn item_type(&self) -> Option<&ValueType> {
        match &self.kind {
            ValueKind::Array(item) => Some(item),
            _ => None,
        }
    }

    pub fn to_expr(&self) -> TypeExpr {
        let kind = match &self.kind {
            ValueKind::Any => TypeKind::Any,
            ValueKind::Scalar(scalar) => TypeKind::Scalar(*scalar),
            ValueKind::Component(name) => TypeKind::Component(name.clone()),
            ValueKind::Array(item) => TypeKind::Array(Box::new(item.to_expr())),
        };
        TypeExpr {
            kind,
            optional: self.optional,
        }
    }

    /// True when `value` conforms, items included
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_undefined() {
            return self.optional;
        }
        match (&self.kind, value) {
            (ValueKind::Any, _) => true,
            (ValueKind::Scalar(ScalarKind::Boolean), Value::Boolean(_))
            | (ValueKind::Scalar(ScalarKind::Number), Value::Number(_))
            | (ValueKind::Scalar(ScalarKind::String), Value::String(_))
            | (ValueKind::Scalar(ScalarKind::Object), Value::Object(_))
            | (ValueKind::Scalar(ScalarKind::Date), Value::Date(_)) => true,
            (ValueKind::Component(name), Value::Component(component)) => {
                !component.is_class() && component.type_name() == name
            }
            (ValueKind::Array(item), Value::Array(array)) => {
                array.items().iter().all(|value| item.accepts(value))
            }
            _ => false,
        }
    }

    /// Append every failing validator for `value` to `failures`. Array items
    /// extend the path with `[i]`, embedded components with `.name`.
    pub(crate) fn collect_failures(
        &self,
        value: &Value,
        path: &str,
        failures: &mut Vec<ValidationFailure>,
    ) -> ComponentResult<()> {
        if value.is_undefined() && self.optional {
            return Ok(());
        }

        for validator in &self.validators {
            if !validator.test(value) {
                failures.push(ValidationFailure {
                    validator: validator.clone(),
                    path: path.to_string(),
                });
            }
        }

        match (&self.kind, value) {
            (ValueKind::Array(item), Value::Array(array)) => {
                for (index, value) in array.items().iter().enumerate() {
                    item.collect_failures(value, &format!("{}[{}]", path, index), failures)?;
                }
            }
            (_, Value::Component(component))
                if component.is_embedded() && !component.is_class() =>
            {
                component.collect_failures(path, failures)?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

/// `base.name`, or `name` at the root
pub(crate) fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}
