//! Field activation
//!
//! An attribute is active when its value reflects store state or a local
//! write made since. The storable layer uses the active set to describe
//! partial loads and to compute save masks. Activation is monotonic: turning
//! one field on never turns another off.

use crate::component::Component;
use crate::errors::ComponentResult;
use component_types::FieldMask;

impl Component {
    /// Whether `name` is active. A fork answers from its base until the
    /// attribute is materialized.
    pub fn is_field_active(&self, name: &str) -> bool {
        if let Some(attribute) = self.materialized_attribute(name) {
            return attribute.is_active();
        }
        match self.base() {
            Some(base) => base.is_field_active(name),
            None => false,
        }
    }

    pub fn active_fields(&self) -> FieldMask {
        self.attribute_names()
            .into_iter()
            .filter(|name| self.is_field_active(name))
            .collect()
    }

    /// Fields of `mask` that are declared here but not yet active
    pub fn inactive_fields(&self, mask: &FieldMask) -> FieldMask {
        mask.iter()
            .filter(|name| self.has_attribute(name) && !self.is_field_active(name))
            .collect()
    }

    /// Activate every declared field named in `mask`; unknown names are ignored
    pub fn activate_fields(&self, mask: &FieldMask) -> ComponentResult<()> {
        for name in mask.iter() {
            if self.has_attribute(name) {
                self.attribute(name)?.activate();
            }
        }
        Ok(())
    }

    pub fn deactivate_fields(&self, mask: &FieldMask) -> ComponentResult<()> {
        for name in mask.iter() {
            if self.has_attribute(name) {
                self.attribute(name)?.deactivate();
            }
        }
        Ok(())
    }

    pub fn deactivate_all(&self) -> ComponentResult<()> {
        for attribute in self.attributes()? {
            attribute.deactivate();
        }
        Ok(())
    }
}
