//! Business-rule validators
//!
//! A validator is `{name, function, message}`. Functions are registered by
//! name in a [`ValidatorRegistry`] so validators survive a round trip through
//! introspection descriptors. The builtin library covers the usual length,
//! numeric and membership checks.

use crate::errors::{ComponentError, ComponentResult};
use crate::value::Value;
use component_types::{FunctionRef, ValidatorDescriptor};
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Validator function: `(value, arguments) -> passed`
pub type ValidatorFn = Arc<dyn Fn(&Value, &[JsonValue]) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Validator {
    name: String,
    function_name: String,
    arguments: Vec<JsonValue>,
    message: String,
    function: ValidatorFn,
}

impl Validator {
    pub fn new(name: impl Into<String>, arguments: Vec<JsonValue>, function: ValidatorFn) -> Self {
        let name = name.into();
        let message = default_message(&name, &arguments);
        Self {
            function_name: name.clone(),
            name,
            arguments,
            message,
            function,
        }
    }

    /// Validator with no arguments backed by a plain predicate
    pub fn custom(
        name: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, Vec::new(), Arc::new(move |value, _| predicate(value)))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn arguments(&self) -> &[JsonValue] {
        &self.arguments
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn function(&self) -> &ValidatorFn {
        &self.function
    }

    /// `name(arg1, arg2)`
    pub fn signature(&self) -> String {
        signature(&self.name, &self.arguments)
    }

    pub fn test(&self, value: &Value) -> bool {
        (self.function)(value, &self.arguments)
    }

    pub fn descriptor(&self) -> ValidatorDescriptor {
        ValidatorDescriptor {
            name: self.name.clone(),
            function: FunctionRef {
                name: self.function_name.clone(),
                arguments: self.arguments.clone(),
            },
            message: self.message.clone(),
        }
    }

    // ── Builtins ─────────────────────────────────────────────────────

    pub fn not_empty() -> Self {
        builtin("notEmpty", Vec::new())
    }

    pub fn min_length(min: usize) -> Self {
        builtin("minLength", vec![JsonValue::from(min)])
    }

    pub fn max_length(max: usize) -> Self {
        builtin("maxLength", vec![JsonValue::from(max)])
    }

    pub fn range_length(min: usize, max: usize) -> Self {
        builtin("rangeLength", vec![JsonValue::from(min), JsonValue::from(max)])
    }

    pub fn integer() -> Self {
        builtin("integer", Vec::new())
    }

    pub fn positive() -> Self {
        builtin("positive", Vec::new())
    }

    pub fn negative() -> Self {
        builtin("negative", Vec::new())
    }

    pub fn greater_than(bound: f64) -> Self {
        builtin("greaterThan", vec![number_argument(bound)])
    }

    pub fn greater_than_or_equal(bound: f64) -> Self {
        builtin("greaterThanOrEqual", vec![number_argument(bound)])
    }

    pub fn less_than(bound: f64) -> Self {
        builtin("lessThan", vec![number_argument(bound)])
    }

    pub fn less_than_or_equal(bound: f64) -> Self {
        builtin("lessThanOrEqual", vec![number_argument(bound)])
    }

    pub fn range(min: f64, max: f64) -> Self {
        builtin("range", vec![number_argument(min), number_argument(max)])
    }

    pub fn any_of<I, V>(allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let allowed: Vec<JsonValue> = allowed.into_iter().map(Into::into).collect();
        builtin("anyOf", vec![JsonValue::Array(allowed)])
    }

    pub fn none_of<I, V>(forbidden: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let forbidden: Vec<JsonValue> = forbidden.into_iter().map(Into::into).collect();
        builtin("noneOf", vec![JsonValue::Array(forbidden)])
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("message", &self.message)
            .finish()
    }
}

/// One failed validator and where it failed (`""`, `"[1]"`, `"author.name"`)
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub validator: Validator,
    pub path: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.validator.message())
        } else {
            write!(f, "{} (path: '{}')", self.validator.message(), self.path)
        }
    }
}

/// Validator functions resolvable by name
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    functions: Arc<DashMap<String, ValidatorFn>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (name, function) in builtin_functions() {
            registry.register(name, function);
        }
        registry
    }

    pub fn register(&self, name: impl Into<String>, function: ValidatorFn) {
        self.functions.insert(name.into(), function);
    }

    /// Make a (custom) validator's function resolvable under its function name
    pub fn register_validator(&self, validator: &Validator) {
        self.register(validator.function_name(), Arc::clone(validator.function()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn resolve(&self, descriptor: &ValidatorDescriptor) -> ComponentResult<Validator> {
        let function = self
            .functions
            .get(&descriptor.function.name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                ComponentError::Configuration(format!(
                    "unknown validator function `{}`",
                    descriptor.function.name
                ))
            })?;
        Ok(Validator {
            name: descriptor.name.clone(),
            function_name: descriptor.function.name.clone(),
            arguments: descriptor.function.arguments.clone(),
            message: descriptor.message.clone(),
            function,
        })
    }
}

fn signature(name: &str, arguments: &[JsonValue]) -> String {
    let arguments: Vec<String> = arguments.iter().map(JsonValue::to_string).collect();
    format!("{}({})", name, arguments.join(", "))
}

fn default_message(name: &str, arguments: &[JsonValue]) -> String {
    format!("The validator `{}` failed", signature(name, arguments))
}

fn number_argument(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        JsonValue::from(value as i64)
    } else {
        JsonValue::from(value)
    }
}

fn builtin(name: &str, arguments: Vec<JsonValue>) -> Validator {
    let function = builtin_functions()
        .into_iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, function)| function)
        .unwrap_or_else(|| Arc::new(|_: &Value, _: &[JsonValue]| false));
    Validator::new(name, arguments, function)
}

fn builtin_functions() -> Vec<(&'static str, ValidatorFn)> {
    vec![
        ("notEmpty", Arc::new(|value: &Value, _: &[JsonValue]| {
            length_of(value).is_some_and(|length| length > 0)
        }) as ValidatorFn),
        ("minLength", Arc::new(|value: &Value, args: &[JsonValue]| {
            match (length_of(value), usize_argument(args, 0)) {
                (Some(length), Some(min)) => length >= min,
                _ => false,
            }
        })),
        ("maxLength", Arc::new(|value: &Value, args: &[JsonValue]| {
            match (length_of(value), usize_argument(args, 0)) {
                (Some(length), Some(max)) => length <= max,
                _ => false,
            }
        })),
        ("rangeLength", Arc::new(|value: &Value, args: &[JsonValue]| {
            match (length_of(value), usize_argument(args, 0), usize_argument(args, 1)) {
                (Some(length), Some(min), Some(max)) => (min..=max).contains(&length),
                _ => false,
            }
        })),
        ("integer", Arc::new(|value: &Value, _: &[JsonValue]| {
            value.as_f64().is_some_and(|number| number.fract() == 0.0)
        })),
        ("positive", Arc::new(|value: &Value, _: &[JsonValue]| {
            value.as_f64().is_some_and(|number| number > 0.0)
        })),
        ("negative", Arc::new(|value: &Value, _: &[JsonValue]| {
            value.as_f64().is_some_and(|number| number < 0.0)
        })),
        ("greaterThan", compare(|number, bound| number > bound)),
        ("greaterThanOrEqual", compare(|number, bound| number >= bound)),
        ("lessThan", compare(|number, bound| number < bound)),
        ("lessThanOrEqual", compare(|number, bound| number <= bound)),
        ("range", Arc::new(|value: &Value, args: &[JsonValue]| {
            match (
                value.as_f64(),
                args.first().and_then(JsonValue::as_f64),
                args.get(1).and_then(JsonValue::as_f64),
            ) {
                (Some(number), Some(min), Some(max)) => number >= min && number <= max,
                _ => false,
            }
        })),
        ("anyOf", Arc::new(|value: &Value, args: &[JsonValue]| {
            list_argument(args).is_some_and(|allowed| allowed.iter().any(|c| scalar_eq(value, c)))
        })),
        ("noneOf", Arc::new(|value: &Value, args: &[JsonValue]| {
            list_argument(args)
                .is_some_and(|forbidden| !forbidden.iter().any(|c| scalar_eq(value, c)))
        })),
    ]
}

fn compare(predicate: fn(f64, f64) -> bool) -> ValidatorFn {
    Arc::new(move |value: &Value, args: &[JsonValue]| {
        match (value.as_f64(), args.first().and_then(JsonValue::as_f64)) {
            (Some(number), Some(bound)) => predicate(number, bound),
            _ => false,
        }
    })
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(array) => Some(array.len()),
        Value::Object(object) => Some(object.len()),
        _ => None,
    }
}

fn usize_argument(args: &[JsonValue], index: usize) -> Option<usize> {
    args.get(index)
        .and_then(JsonValue::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

fn list_argument(args: &[JsonValue]) -> Option<&Vec<JsonValue>> {
    args.first().and_then(JsonValue::as_array)
}

fn scalar_eq(value: &Value, candidate: &JsonValue) -> bool {
    match (value, candidate) {
        (Value::String(a), JsonValue::String(b)) => a == b,
        (Value::Boolean(a), JsonValue::Bool(b)) => a == b,
        (Value::Number(a), JsonValue::Number(b)) => b.as_f64() == Some(*a),
        (Value::Undefined, JsonValue::Null) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_check_values() {
        assert!(Validator::not_empty().test(&Value::from("x")));
        assert!(!Validator::not_empty().test(&Value::from("")));
        assert!(!Validator::not_empty().test(&Value::Undefined));
        assert!(Validator::min_length(2).test(&Value::from("ab")));
        assert!(!Validator::max_length(2).test(&Value::from("abc")));
        assert!(Validator::range_length(1, 3).test(&Value::from(vec![Value::from(1)])));
        assert!(Validator::integer().test(&Value::from(3)));
        assert!(!Validator::integer().test(&Value::from(3.5)));
        assert!(Validator::range(1.0, 10.0).test(&Value::from(10)));
        assert!(Validator::greater_than(1.5).test(&Value::from(2)));
        assert!(Validator::any_of(["drama", "comedy"]).test(&Value::from("drama")));
        assert!(Validator::none_of([1, 2]).test(&Value::from(3)));
        assert!(!Validator::positive().test(&Value::from("1")));
    }

    #[test]
    fn default_message_uses_signature() {
        assert_eq!(
            Validator::min_length(3).message(),
            "The validator `minLength(3)` failed"
        );
        assert_eq!(Validator::range(1.0, 2.5).signature(), "range(1, 2.5)");
    }

    #[test]
    fn registry_resolves_descriptors() {
        let registry = ValidatorRegistry::with_builtins();
        let original = Validator::max_length(5).with_message("too long");
        let resolved = registry.resolve(&original.descriptor()).unwrap();
        assert_eq!(resolved.message(), "too long");
        assert!(resolved.test(&Value::from("short")));
        assert!(!resolved.test(&Value::from("much too long")));

        let custom = Validator::custom("isUppercase", |value| {
            value.as_str().is_some_and(|text| text.chars().all(|c| c.is_uppercase()))
        });
        assert!(registry.resolve(&custom.descriptor()).is_err());
        registry.register_validator(&custom);
        assert!(registry.resolve(&custom.descriptor()).unwrap().test(&Value::from("ABC")));
    }
}
