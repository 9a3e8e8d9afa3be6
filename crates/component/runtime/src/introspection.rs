//! Schema introspection
//!
//! Live attributes and component types map to plain descriptors and back.
//! Only exposed properties are described; `value` and `default` appear only
//! when the exposure allows reading, and evaluator defaults are never
//! described.

use crate::accessor::DefaultValue;
use crate::attribute::Attribute;
use crate::component_type::ComponentType;
use crate::errors::ComponentResult;
use crate::serialization::{plain_from_json, plain_to_json};
use crate::spec::{AttributeSpec, AttributeTemplate, ItemsSpec, MethodSpec};
use crate::validator::{Validator, ValidatorRegistry};
use crate::value::Value;
use crate::value_type::ValueType;
use component_types::{
    AttributeDescriptor, ComponentDescriptor, ItemsDescriptor, MethodDescriptor,
    PropertyDescriptor, PrototypeDescriptor, ValidatorDescriptor, COMPONENT_TYPE,
};

impl AttributeTemplate {
    /// Descriptor for this declaration holding `value`, or `None` when the
    /// attribute is not exposed
    pub fn describe(&self, value: Option<&Value>) -> ComponentResult<Option<AttributeDescriptor>> {
        let Some(exposure) = self.exposure else {
            return Ok(None);
        };

        let mut descriptor = AttributeDescriptor::new(&self.name, self.value_type.to_string());
        descriptor.exposure = Some(exposure);

        if exposure.is_gettable() {
            if let Some(value) = value {
                descriptor.value = Some(plain_to_json(value)?);
            }
            if let Some(DefaultValue::Constant(default)) = &self.default {
                descriptor.default = Some(plain_to_json(default)?);
            }
        }

        descriptor.validators = describe_validators(self.value_type.validators());
        descriptor.items = describe_items(&self.value_type);
        Ok(Some(descriptor))
    }
}

impl Attribute {
    pub fn introspect(&self) -> ComponentResult<Option<AttributeDescriptor>> {
        let value = if self.is_computed() { None } else { self.peek() };
        self.template().describe(value.as_ref())
    }
}

impl AttributeSpec {
    /// Rebuild a declaration from a descriptor. Validator functions are
    /// resolved by name through `validators`.
    pub fn unintrospect(
        descriptor: &AttributeDescriptor,
        validators: &ValidatorRegistry,
    ) -> ComponentResult<AttributeSpec> {
        let mut spec = AttributeSpec::new(&descriptor.name, &descriptor.value_type);
        if let Some(value) = &descriptor.value {
            spec = spec.value(plain_from_json(value)?);
        }
        if let Some(default) = &descriptor.default {
            spec = spec.default(plain_from_json(default)?);
        }
        if let Some(exposure) = descriptor.exposure {
            spec = spec.exposure(exposure);
        }
        if let Some(list) = &descriptor.validators {
            spec = spec.validators(resolve_validators(list, validators)?);
        }
        if let Some(items) = &descriptor.items {
            spec = spec.items(items_spec(items, validators)?);
        }
        Ok(spec)
    }
}

impl MethodSpec {
    pub fn describe(&self) -> Option<MethodDescriptor> {
        self.exposure
            .map(|exposure| MethodDescriptor::new(&self.name, Some(exposure)))
    }
}

impl ComponentType {
    /// Class-level properties (with their current values) plus the
    /// instance-level prototype
    pub fn introspect(&self) -> ComponentResult<ComponentDescriptor> {
        let mut properties = Vec::new();
        if !self.class_attribute_templates().is_empty() {
            for attribute in self.class_component().attributes()? {
                if let Some(descriptor) = attribute.introspect()? {
                    properties.push(PropertyDescriptor::Attribute(descriptor));
                }
            }
        }
        properties.extend(
            self.class_methods()
                .iter()
                .filter_map(MethodSpec::describe)
                .map(PropertyDescriptor::Method),
        );

        let mut prototype = Vec::new();
        for template in self.attribute_templates() {
            if let Some(descriptor) = template.describe(template.value.as_ref())? {
                prototype.push(PropertyDescriptor::Attribute(descriptor));
            }
        }
        prototype.extend(
            self.methods()
                .iter()
                .filter_map(MethodSpec::describe)
                .map(PropertyDescriptor::Method),
        );

        Ok(ComponentDescriptor {
            name: self.name().to_string(),
            kind: COMPONENT_TYPE.to_string(),
            embedded: self.is_embedded(),
            properties,
            prototype: (!prototype.is_empty()).then_some(PrototypeDescriptor {
                properties: prototype,
            }),
        })
    }

    pub fn unintrospect(
        descriptor: &ComponentDescriptor,
        validators: &ValidatorRegistry,
    ) -> ComponentResult<ComponentType> {
        let mut builder = ComponentType::builder(&descriptor.name);
        if descriptor.embedded {
            builder = builder.embedded();
        }
        for property in &descriptor.properties {
            match property {
                PropertyDescriptor::Attribute(attribute) => {
                    let spec = AttributeSpec::unintrospect(attribute, validators)?;
                    builder = builder.class_attribute(spec);
                }
                PropertyDescriptor::Method(method) => {
                    builder = builder.class_method(method_spec(method));
                }
            }
        }
        let prototype = descriptor.prototype.iter().flat_map(|p| p.properties.iter());
        for property in prototype {
            match property {
                PropertyDescriptor::Attribute(attribute) => {
                    let spec = AttributeSpec::unintrospect(attribute, validators)?;
                    builder = builder.attribute(spec);
                }
                PropertyDescriptor::Method(method) => {
                    builder = builder.method(method_spec(method));
                }
            }
        }
        builder.build()
    }
}

fn method_spec(descriptor: &MethodDescriptor) -> MethodSpec {
    MethodSpec {
        name: descriptor.name.clone(),
        exposure: descriptor.exposure,
    }
}

fn describe_validators(validators: &[Validator]) -> Option<Vec<ValidatorDescriptor>> {
    (!validators.is_empty()).then(|| validators.iter().map(Validator::descriptor).collect())
}

fn describe_items(value_type: &ValueType) -> Option<ItemsDescriptor> {
    let item = value_type.item_type()?;
    let descriptor = ItemsDescriptor {
        validators: describe_validators(item.validators()),
        items: describe_items(item).map(Box::new),
    };
    (!descriptor.is_empty()).then_some(descriptor)
}

fn resolve_validators(
    descriptors: &[ValidatorDescriptor],
    registry: &ValidatorRegistry,
) -> ComponentResult<Vec<Validator>> {
    descriptors
        .iter()
        .map(|descriptor| registry.resolve(descriptor))
        .collect()
}

fn items_spec(
    descriptor: &ItemsDescriptor,
    registry: &ValidatorRegistry,
) -> ComponentResult<ItemsSpec> {
    Ok(ItemsSpec {
        validators: match &descriptor.validators {
            Some(list) => resolve_validators(list, registry)?,
            None => Vec::new(),
        },
        items: match &descriptor.items {
            Some(nested) => Some(Box::new(items_spec(nested, registry)?)),
            None => None,
        },
    })
}
