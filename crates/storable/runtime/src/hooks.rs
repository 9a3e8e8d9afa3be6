//! Storable lifecycle hooks
//!
//! Hooks are registered per component type on a [`Layer`] and run around
//! saves, deletes and loads. A layer runs them pre-order: the component's
//! own hooks first, then the hooks of every embedded component it holds,
//! depth first in schema order.

use crate::errors::StorableResult;
use crate::layer::Layer;
use async_trait::async_trait;
use component_runtime::Component;
use std::fmt;

/// Lifecycle callbacks. Every method defaults to a no-op.
///
/// Hooks run while the layer holds the identity lock of the root component,
/// so a hook must not save or delete that same component again.
#[async_trait]
pub trait StorableHooks: Send + Sync {
    async fn before_save(&self, _component: &Component, _layer: &Layer) -> StorableResult<()> {
        Ok(())
    }

    async fn after_save(&self, _component: &Component, _layer: &Layer) -> StorableResult<()> {
        Ok(())
    }

    async fn before_delete(&self, _component: &Component, _layer: &Layer) -> StorableResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _component: &Component, _layer: &Layer) -> StorableResult<()> {
        Ok(())
    }

    async fn after_load(&self, _component: &Component, _layer: &Layer) -> StorableResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    AfterLoad,
}

impl HookEvent {
    pub(crate) async fn dispatch(
        self,
        hooks: &dyn StorableHooks,
        component: &Component,
        layer: &Layer,
    ) -> StorableResult<()> {
        match self {
            Self::BeforeSave => hooks.before_save(component, layer).await,
            Self::AfterSave => hooks.after_save(component, layer).await,
            Self::BeforeDelete => hooks.before_delete(component, layer).await,
            Self::AfterDelete => hooks.after_delete(component, layer).await,
            Self::AfterLoad => hooks.after_load(component, layer).await,
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeSave => write!(f, "before_save"),
            Self::AfterSave => write!(f, "after_save"),
            Self::BeforeDelete => write!(f, "before_delete"),
            Self::AfterDelete => write!(f, "after_delete"),
            Self::AfterLoad => write!(f, "after_load"),
        }
    }
}
