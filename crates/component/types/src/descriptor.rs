//! Introspection descriptors
//!
//! JSON-compatible schema exchange format. Field order on the wire follows
//! declaration order below: `name, type, value, default, exposure, valueType,
//! validators, items`. Absent optional fields are omitted entirely.

use crate::Exposure;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const ATTRIBUTE_TYPE: &str = "Attribute";
pub const METHOD_TYPE: &str = "Method";
pub const COMPONENT_TYPE: &str = "Component";

/// Reference to a validator function by registered name plus arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<JsonValue>,
}

/// Serialized validator: `{name, function, message}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    pub name: String,
    pub function: FunctionRef,
    pub message: String,
}

/// Validators applying to array items, recursively for nested arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<ValidatorDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ItemsDescriptor>>,
}

impl ItemsDescriptor {
    pub fn is_empty(&self) -> bool {
        self.validators.is_none() && self.items.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<Exposure>,
    #[serde(rename = "valueType")]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<ValidatorDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsDescriptor>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ATTRIBUTE_TYPE.to_string(),
            value: None,
            default: None,
            exposure: None,
            value_type: value_type.into(),
            validators: None,
            items: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<Exposure>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, exposure: Option<Exposure>) -> Self {
        Self {
            name: name.into(),
            kind: METHOD_TYPE.to_string(),
            exposure,
        }
    }
}

/// Any property of a component type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyDescriptor {
    Attribute(AttributeDescriptor),
    Method(MethodDescriptor),
}

impl PropertyDescriptor {
    pub fn name(&self) -> &str {
        match self {
            PropertyDescriptor::Attribute(attribute) => &attribute.name,
            PropertyDescriptor::Method(method) => &method.name,
        }
    }
}

/// Instance-level half of a component type descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrototypeDescriptor {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDescriptor>,
}

/// Component type descriptor: class-level properties plus the prototype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub embedded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype: Option<PrototypeDescriptor>,
}
